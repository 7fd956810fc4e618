//
//  bitbucket-client
//  api/pagination.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Collection walker built on [`ApiClient::get`].

use serde::de::DeserializeOwned;
use tracing::debug;

use super::client::{ApiClient, Endpoint};
use super::common::{ApiError, PaginatedEnvelope};
use crate::auth::Profile;

impl ApiClient {
    /// Fetches every page of a collection and returns the elements in
    /// server order.
    ///
    /// Pages are requested one at a time. The `next` link of each page is
    /// followed verbatim, even when it points at another host, and carries
    /// the same authorization as the first request.
    ///
    /// # Errors
    ///
    /// The first failing page aborts the walk; elements already collected
    /// are discarded.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use bitbucket_client::api::{ApiClient, Endpoint};
    /// use bitbucket_client::auth::Profile;
    ///
    /// # async fn example(profile: &Profile) -> Result<(), bitbucket_client::api::ApiError> {
    /// let client = ApiClient::new()?;
    /// let branches: Vec<serde_json::Value> = client
    ///     .get_all(profile, &Endpoint::repository("acme/widgets", "refs/branches"))
    ///     .await?;
    /// println!("{} branches", branches.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        profile: &Profile,
        endpoint: &Endpoint,
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut current = endpoint.clone();
        let mut pages = 0usize;

        loop {
            let page: PaginatedEnvelope<T> = self.get(profile, &current).await?;
            pages += 1;
            let next = page.next_url().map(Endpoint::absolute);
            items.extend(page.values);

            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        debug!(pages, items = items.len(), %endpoint, "collection fetched");
        Ok(items)
    }
}
