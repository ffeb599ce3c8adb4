//! CardDAV discovery: from a server base URL to addressbook URLs.
//!
//! ```text
//! Start ──probe──▶ PartitionResolved ──▶ PrincipalResolved ──▶ HomeResolved ──▶ AddressbooksResolved
//!   │                                          ▲                    ▲
//!   └──────────── well-known body shortcut ────┴────────────────────┘
//! ```
//!
//! The well-known probe decides which [`DiscoveryRoute`] the server takes.
//! Nothing is cached between runs.

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::error::{DiscoveryStage, ProviderError, ProviderResult};

use super::config::{AddressbookListing, CardDavConfig};
use super::transport::{DavRequest, DavResponse, Depth, Transport, check_status, status_error};
use super::xml;

/// Header iCloud uses to name the per-account partition.
pub const PARTITION_HEADER: &str = "x-apple-user-partition";

/// Path of the well-known CardDAV endpoint.
pub const WELL_KNOWN_PATH: &str = "/.well-known/carddav";

/// How the server answered the well-known probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryRoute {
    /// Partition header; the account lives on a per-partition host.
    Partition {
        /// Partition number from the header.
        partition: String,
        /// Rewritten base, e.g. `https://p42-contacts.icloud.com/`.
        base: Url,
    },
    /// The probe body already named the addressbook home.
    DirectHome(Url),
    /// The probe body already named the principal.
    DirectPrincipal(Url),
    /// The probe redirected to the context path.
    Redirect(Url),
    /// Nothing useful; the server base is the context path.
    ServerBase(Url),
}

impl DiscoveryRoute {
    /// Returns a short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Partition { .. } => "partition",
            Self::DirectHome(_) => "direct-home",
            Self::DirectPrincipal(_) => "direct-principal",
            Self::Redirect(_) => "redirect",
            Self::ServerBase(_) => "server-base",
        }
    }

    fn is_partitioned(&self) -> bool {
        matches!(self, Self::Partition { .. })
    }
}

/// Resolver state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Nothing known yet.
    Start,
    /// The context path to ask for the principal.
    PartitionResolved(Url),
    /// The principal URL.
    PrincipalResolved(Url),
    /// The addressbook home URL.
    HomeResolved(Url),
    /// Final addressbook URLs.
    AddressbooksResolved(Vec<Url>),
}

/// Everything a discovery run found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Route taken by the probe.
    pub route: DiscoveryRoute,
    /// Principal URL, unless the server skipped straight to the home.
    pub principal: Option<Url>,
    /// Addressbook home URL.
    pub home: Url,
    /// Addressbook collection URLs; never empty.
    pub addressbooks: Vec<Url>,
}

/// Runs discovery against a [`Transport`].
pub struct DiscoveryResolver<'a, T: Transport + ?Sized> {
    transport: &'a T,
    base: Url,
    timeout: Duration,
    listing: AddressbookListing,
}

impl<'a, T: Transport + ?Sized> DiscoveryResolver<'a, T> {
    /// Creates a resolver using the configuration's base URL and timeouts.
    pub fn new(transport: &'a T, config: &CardDavConfig) -> Self {
        Self {
            transport,
            base: config.url.clone(),
            timeout: config.discovery_timeout,
            listing: config.addressbook_listing,
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the well-known URL for the base.
    pub fn well_known_url(&self) -> ProviderResult<Url> {
        self.base.join(WELL_KNOWN_PATH).map_err(|e| {
            ProviderError::configuration(format!("Invalid server URL {}: {}", self.base, e))
        })
    }

    /// PROPFINDs the well-known URL without following redirects and
    /// classifies the answer.
    ///
    /// # Errors
    ///
    /// Transport failures, 401, 403, 429 and 5xx.
    pub async fn probe(&self) -> ProviderResult<DiscoveryRoute> {
        let (url, response) = self.send_probe().await?;
        let route = classify_probe(&self.base, &url, &response)?;
        debug!(url = %url, status = response.status, route = route.kind(), "Well-known probe");
        Ok(route)
    }

    /// Probes like [`probe`](Self::probe), but only accepts a 2xx or 3xx
    /// answer, or one carrying the partition header.
    ///
    /// # Errors
    ///
    /// Everything [`probe`](Self::probe) rejects, plus any other 4xx.
    pub async fn check_reachable(&self) -> ProviderResult<DiscoveryRoute> {
        let (url, response) = self.send_probe().await?;
        let partitioned = response
            .header(PARTITION_HEADER)
            .is_some_and(|value| !value.trim().is_empty());

        if !partitioned && !response.is_success() && !response.is_redirect() {
            let err = status_error(response.status, &response.body).unwrap_or_else(|| {
                ProviderError::invalid_response(format!("Unexpected status {}", response.status))
                    .with_status(response.status)
            });
            return Err(err.at_stage(DiscoveryStage::WellKnown));
        }
        classify_probe(&self.base, &url, &response)
    }

    async fn send_probe(&self) -> ProviderResult<(Url, DavResponse)> {
        let url = self.well_known_url()?;
        let request = DavRequest::propfind(url.clone(), Depth::Zero, xml::propfind_discovery_body()?)
            .with_timeout(self.timeout)
            .without_redirects();

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| e.at_stage(DiscoveryStage::WellKnown))?;
        Ok((url, response))
    }

    /// Runs the full state machine.
    ///
    /// # Errors
    ///
    /// Fails with the stage that could not produce its URL, or with the
    /// transport/status error of that stage.
    pub async fn resolve(&self) -> ProviderResult<Discovery> {
        let mut state = DiscoveryState::Start;
        let mut route: Option<DiscoveryRoute> = None;
        let mut principal: Option<Url> = None;
        let mut home: Option<Url> = None;

        loop {
            state = match state {
                DiscoveryState::Start => {
                    let probed = self.probe().await?;
                    let next = match &probed {
                        DiscoveryRoute::Partition { base, .. } => {
                            DiscoveryState::PartitionResolved(base.clone())
                        }
                        DiscoveryRoute::Redirect(url) | DiscoveryRoute::ServerBase(url) => {
                            DiscoveryState::PartitionResolved(url.clone())
                        }
                        DiscoveryRoute::DirectPrincipal(url) => {
                            DiscoveryState::PrincipalResolved(url.clone())
                        }
                        DiscoveryRoute::DirectHome(url) => DiscoveryState::HomeResolved(url.clone()),
                    };
                    route = Some(probed);
                    next
                }
                DiscoveryState::PartitionResolved(context) => {
                    self.resolve_principal(&context).await?
                }
                DiscoveryState::PrincipalResolved(url) => {
                    principal = Some(url.clone());
                    self.resolve_home(&url).await?
                }
                DiscoveryState::HomeResolved(url) => {
                    home = Some(url.clone());
                    let partitioned = route.as_ref().is_some_and(DiscoveryRoute::is_partitioned);
                    DiscoveryState::AddressbooksResolved(
                        self.resolve_addressbooks(&url, partitioned).await?,
                    )
                }
                DiscoveryState::AddressbooksResolved(addressbooks) => {
                    let (Some(route), Some(home)) = (route, home) else {
                        return Err(ProviderError::internal(
                            "Discovery finished without a route or home",
                        ));
                    };
                    info!(
                        route = route.kind(),
                        home = %home,
                        count = addressbooks.len(),
                        "Discovered addressbooks"
                    );
                    return Ok(Discovery {
                        route,
                        principal,
                        home,
                        addressbooks,
                    });
                }
            };
        }
    }

    /// Asks the context path for the principal. A home-set in the same
    /// answer skips the principal step.
    async fn resolve_principal(&self, context: &Url) -> ProviderResult<DiscoveryState> {
        let stage = DiscoveryStage::Principal;
        let response = self.propfind(context, stage).await?;

        if let Some(home) = find_url(&response.body, "addressbook-home-set", context, stage)? {
            debug!(home = %home, "Context path returned the home-set directly");
            return Ok(DiscoveryState::HomeResolved(home));
        }

        match find_url(&response.body, "current-user-principal", context, stage)? {
            Some(principal) => {
                debug!(principal = %principal, "Resolved principal");
                Ok(DiscoveryState::PrincipalResolved(principal))
            }
            None => Err(ProviderError::discovery(
                stage,
                format!(
                    "No current-user-principal in response from {}: {}",
                    context,
                    excerpt(&response.body)
                ),
            )),
        }
    }

    async fn resolve_home(&self, principal: &Url) -> ProviderResult<DiscoveryState> {
        let stage = DiscoveryStage::HomeSet;
        let response = self.propfind(principal, stage).await?;

        match find_url(&response.body, "addressbook-home-set", principal, stage)? {
            Some(home) => {
                debug!(home = %home, "Resolved addressbook home");
                Ok(DiscoveryState::HomeResolved(home))
            }
            None => Err(ProviderError::discovery(
                stage,
                format!(
                    "No addressbook-home-set in response from {}: {}",
                    principal,
                    excerpt(&response.body)
                ),
            )),
        }
    }

    async fn resolve_addressbooks(&self, home: &Url, partitioned: bool) -> ProviderResult<Vec<Url>> {
        let stage = DiscoveryStage::Addressbooks;
        let use_card_suffix = match self.listing {
            AddressbookListing::CardSuffix => true,
            AddressbookListing::Enumerate => false,
            AddressbookListing::Auto => partitioned,
        };

        if use_card_suffix {
            return Ok(vec![card_collection(home, stage)?]);
        }

        let request = DavRequest::propfind(home.clone(), Depth::One, xml::propfind_collections_body()?)
            .with_timeout(self.timeout);
        let response = self
            .transport
            .send(request)
            .await
            .and_then(check_status)
            .map_err(|e| e.at_stage(stage))?;

        let mut found = Vec::new();
        for entry in xml::parse_multistatus(&response.body).map_err(|e| e.at_stage(stage))? {
            if entry.is_addressbook() {
                found.push(resolve_href(home, &entry.href, stage)?);
            }
        }

        if found.is_empty() {
            debug!(home = %home, "No addressbook collections listed; using the home itself");
            found.push(home.clone());
        }
        Ok(found)
    }

    async fn propfind(&self, url: &Url, stage: DiscoveryStage) -> ProviderResult<DavResponse> {
        let request = DavRequest::propfind(url.clone(), Depth::Zero, xml::propfind_discovery_body()?)
            .with_timeout(self.timeout);
        self.transport
            .send(request)
            .await
            .and_then(check_status)
            .map_err(|e| e.at_stage(stage))
    }
}

/// Classifies the well-known response.
///
/// Order: partition header, home-set in body, principal in body, redirect,
/// then the server base as a fallback.
pub fn classify_probe(
    base: &Url,
    probed: &Url,
    response: &DavResponse,
) -> ProviderResult<DiscoveryRoute> {
    let stage = DiscoveryStage::WellKnown;

    if matches!(response.status, 401 | 403 | 429) || response.status >= 500 {
        if let Some(err) = status_error(response.status, &response.body) {
            return Err(err.at_stage(stage));
        }
    }

    if let Some(partition) = response.header(PARTITION_HEADER).map(str::trim) {
        if !partition.is_empty() {
            return Ok(DiscoveryRoute::Partition {
                partition: partition.to_string(),
                base: partition_base(base, partition)?,
            });
        }
    }

    if response.is_success() {
        if let Some(home) = find_url(&response.body, "addressbook-home-set", probed, stage)? {
            return Ok(DiscoveryRoute::DirectHome(home));
        }
        if let Some(principal) = find_url(&response.body, "current-user-principal", probed, stage)? {
            return Ok(DiscoveryRoute::DirectPrincipal(principal));
        }
    }

    if response.is_redirect() {
        if let Some(location) = response.location() {
            return Ok(DiscoveryRoute::Redirect(resolve_href(probed, location, stage)?));
        }
    }

    Ok(DiscoveryRoute::ServerBase(base.clone()))
}

/// Rewrites `https://contacts.icloud.com` to `https://p{N}-contacts.icloud.com/`.
pub fn partition_base(base: &Url, partition: &str) -> ProviderResult<Url> {
    let stage = DiscoveryStage::WellKnown;
    if !partition.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ProviderError::discovery(
            stage,
            format!("Invalid partition header value {:?}", partition),
        ));
    }
    let host = base.host_str().ok_or_else(|| {
        ProviderError::discovery(stage, format!("Server URL {} has no host", base))
    })?;

    let mut url = base.clone();
    url.set_host(Some(&format!("p{}-{}", partition, host)))
        .map_err(|e| ProviderError::discovery(stage, format!("Invalid partition host: {}", e)))?;
    url.set_path("/");
    url.set_query(None);
    Ok(url)
}

/// Resolves an href against the URL of the response that contained it.
pub fn resolve_href(context: &Url, href: &str, stage: DiscoveryStage) -> ProviderResult<Url> {
    context.join(href.trim()).map_err(|e| {
        ProviderError::discovery(stage, format!("Invalid href {:?} from {}: {}", href, context, e))
    })
}

/// The `card/` collection under a home, with exactly one slash between.
pub fn card_collection(home: &Url, stage: DiscoveryStage) -> ProviderResult<Url> {
    let mut base = home.clone();
    let trimmed = format!("{}/", home.path().trim_end_matches('/'));
    base.set_path(&trimmed);
    resolve_href(&base, "card/", stage)
}

fn find_url(
    body: &str,
    parent: &str,
    context: &Url,
    stage: DiscoveryStage,
) -> ProviderResult<Option<Url>> {
    xml::find_href_in(body, parent)
        .map(|href| resolve_href(context, &href, stage))
        .transpose()
}

fn excerpt(body: &str) -> String {
    body.chars().take(300).collect()
}
