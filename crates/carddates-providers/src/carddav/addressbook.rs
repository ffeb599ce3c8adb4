//! Addressbook REPORT and vCard extraction.

use std::time::Duration;

use carddates_core::split_vcards;
use quick_xml::escape::unescape;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::transport::{DavRequest, Transport, status_error};
use super::xml;

/// Fetches every vCard of one addressbook as raw text.
///
/// # Errors
///
/// Transport failures, and any status other than 207. 401 and 403 keep
/// their authentication/authorization codes; everything else is an
/// unexpected-status error.
pub async fn fetch_all_vcards<T: Transport + ?Sized>(
    transport: &T,
    addressbook: &Url,
    timeout: Duration,
) -> ProviderResult<Vec<String>> {
    let request = DavRequest::report(addressbook.clone(), xml::addressbook_query_body()?)
        .with_timeout(timeout);
    let response = transport.send(request).await?;

    if !response.is_multistatus() {
        let err = match response.status {
            401 | 403 => status_error(response.status, &response.body),
            _ => None,
        }
        .unwrap_or_else(|| {
            ProviderError::unexpected_status(
                response.status,
                format!("REPORT returned {} for {}", response.status, addressbook),
            )
        });
        warn!(url = %addressbook, status = response.status, "Addressbook REPORT rejected");
        return Err(err);
    }

    let vcards = extract_vcards(&response.body);
    debug!(url = %addressbook, count = vcards.len(), "Fetched vCards");
    Ok(vcards)
}

/// Returns every vCard segment of a REPORT body, XML entities decoded.
///
/// Segments are found by their markers, so the surrounding XML shape
/// (escaped text, CDATA, whitespace) does not matter.
pub fn extract_vcards(body: &str) -> Vec<String> {
    split_vcards(body)
        .into_iter()
        .map(|segment| match unescape(segment) {
            Ok(decoded) => decoded.into_owned(),
            // CDATA content is not escaped and may hold a bare `&`.
            Err(_) => segment.to_string(),
        })
        .collect()
}
