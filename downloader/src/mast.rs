//! MAST invoke API client: name resolution and Gaia DR2 cone searches.
//!
//! Every MAST call is a POST of `request=<urlencoded json>` to a single
//! invoke endpoint; the service name inside the JSON selects the operation.
//! The page size is fixed server-side at 5000 rows and the null-stripping
//! and cache flags are always disabled so the quality columns survive for
//! filtering.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use clusters::SourceRow;

/// Production MAST invoke endpoint.
pub const MAST_INVOKE_URL: &str = "https://mast.stsci.edu/api/v0/invoke";

/// Rows per cone-search page, fixed by the service.
pub const PAGE_SIZE: u32 = 5000;

const NAME_LOOKUP_SERVICE: &str = "Mast.Name.Lookup";
const GAIA_CONE_SERVICE: &str = "Mast.Catalogs.GaiaDR2.Cone";
const GAIA_COLUMNS_CONFIG: &str = "Mast.Catalogs.Gaia.Cone";

/// A resolved sky position: the cone-search center and radius, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    pub ra: f64,
    pub dec: f64,
    pub radius: f64,
}

/// Name lookup failures. Fatal; the pipeline never retries.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no coordinate match for {0:?}")]
    NoMatch(String),
    #[error("name lookup request failed: {0}")]
    Http(String),
    #[error("malformed name lookup response: {0}")]
    Parse(String),
}

/// Cone-search failures on any page. Fatal under the default page policy.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("cone search request failed: {0}")]
    Http(String),
    #[error("malformed cone search response: {0}")]
    Parse(String),
}

/// Transport-level failure, mapped into the caller's error type.
enum InvokeError {
    Http(String),
    Parse(String),
}

impl From<InvokeError> for ResolveError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Http(msg) => ResolveError::Http(msg),
            InvokeError::Parse(msg) => ResolveError::Parse(msg),
        }
    }
}

impl From<InvokeError> for QueryError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Http(msg) => QueryError::Http(msg),
            InvokeError::Parse(msg) => QueryError::Parse(msg),
        }
    }
}

#[derive(Serialize)]
struct LookupParams<'a> {
    input: &'a str,
    format: &'a str,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    service: &'a str,
    params: LookupParams<'a>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(rename = "resolvedCoordinate", default)]
    resolved_coordinate: Vec<ResolvedCoordinate>,
}

#[derive(Debug, Deserialize)]
struct ResolvedCoordinate {
    ra: f64,
    decl: f64,
    radius: f64,
}

#[derive(Serialize)]
struct ConeParams<'a> {
    ra: f64,
    dec: f64,
    radius: f64,
    input: &'a str,
}

#[derive(Serialize)]
struct ConeRequest<'a> {
    service: &'a str,
    params: ConeParams<'a>,
    format: &'a str,
    pagesize: u32,
    page: u32,
    removenullcolumns: bool,
    removenullrows: bool,
    removecache: bool,
    columnsconfigid: &'a str,
}

/// One page of cone-search results.
#[derive(Debug, Deserialize)]
pub struct ConePage {
    #[serde(default)]
    pub data: Vec<SourceRow>,
    pub paging: Paging,
}

/// Pagination metadata. `pages_filtered` is authoritative on page 1 and
/// assumed stable across pages of the same run.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub pages_filtered: u32,
    #[serde(default)]
    pub page_size: u32,
}

/// Blocking client for the MAST invoke endpoint.
#[derive(Debug, Clone)]
pub struct MastClient {
    invoke_url: String,
}

impl MastClient {
    /// Client against the production MAST endpoint.
    pub fn new() -> Self {
        Self::with_url(MAST_INVOKE_URL)
    }

    /// Client against a custom invoke URL (test servers, mirrors).
    pub fn with_url(invoke_url: &str) -> Self {
        Self {
            invoke_url: invoke_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a cluster name to a sky position.
    ///
    /// Uses the first resolved coordinate when the lookup returns several.
    pub fn resolve(&self, name: &str) -> Result<SkyPosition, ResolveError> {
        let request = LookupRequest {
            service: NAME_LOOKUP_SERVICE,
            params: LookupParams {
                input: name,
                format: "json",
            },
        };
        let response: LookupResponse = self.invoke(&request)?;
        position_from_lookup(name, &response)
    }

    /// Fetch one cone-search page for a resolved position.
    pub fn fetch_page(
        &self,
        name: &str,
        position: SkyPosition,
        page: u32,
    ) -> Result<ConePage, QueryError> {
        let request = ConeRequest {
            service: GAIA_CONE_SERVICE,
            params: ConeParams {
                ra: position.ra,
                dec: position.dec,
                radius: position.radius,
                input: name,
            },
            format: "json",
            pagesize: PAGE_SIZE,
            page,
            removenullcolumns: false,
            removenullrows: false,
            removecache: false,
            columnsconfigid: GAIA_COLUMNS_CONFIG,
        };
        Ok(self.invoke(&request)?)
    }

    fn invoke<T: DeserializeOwned>(&self, request: &impl Serialize) -> Result<T, InvokeError> {
        let payload =
            serde_json::to_string(request).map_err(|e| InvokeError::Parse(e.to_string()))?;
        let body = form_body(&payload);

        let mut response = ureq::post(&self.invoke_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "text/plain")
            .send(body.as_str())
            .map_err(|e| InvokeError::Http(e.to_string()))?;

        response
            .body_mut()
            .read_json::<T>()
            .map_err(|e| InvokeError::Parse(e.to_string()))
    }
}

impl Default for MastClient {
    fn default() -> Self {
        Self::new()
    }
}

fn form_body(payload: &str) -> String {
    format!("request={}", urlencoding::encode(payload))
}

fn position_from_lookup(
    name: &str,
    response: &LookupResponse,
) -> Result<SkyPosition, ResolveError> {
    let first = response
        .resolved_coordinate
        .first()
        .ok_or_else(|| ResolveError::NoMatch(name.to_string()))?;
    Ok(SkyPosition {
        ra: first.ra,
        dec: first.decl,
        radius: first.radius,
    })
}
