//! Static endpoint registry.
//!
//! Every remote operation the client can reach is described once here.
//! Descriptors are `'static` and looked up by dotted name.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::error::UsageError;

/// HTTP verb used for an endpoint under the bearer scheme.
///
/// Shared-secret requests are always POSTed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// Versions of the service API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// Version 0, experimental endpoints
    Experimental,
    V2,
    V3,
}

impl ApiVersion {
    pub fn number(&self) -> u8 {
        match self {
            ApiVersion::Experimental => 0,
            ApiVersion::V2 => 2,
            ApiVersion::V3 => 3,
        }
    }

    /// Experimental and v3 endpoints only accept bearer credentials.
    pub fn requires_bearer(&self) -> bool {
        matches!(self, ApiVersion::Experimental | ApiVersion::V3)
    }
}

/// Credential requirements of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Shared secret only, no scope
    Legacy,
    /// A versioned endpoint. `scope: None` inherits the caller's active scope.
    Versioned {
        version: ApiVersion,
        scope: Option<&'static str>,
    },
}

impl Access {
    pub fn requires_bearer(&self) -> bool {
        match self {
            Access::Legacy => false,
            Access::Versioned { version, .. } => version.requires_bearer(),
        }
    }

    /// The scope this endpoint declares, if any.
    pub fn scope(&self) -> Option<&'static str> {
        match self {
            Access::Legacy => None,
            Access::Versioned { scope, .. } => *scope,
        }
    }
}

/// Static metadata for one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Dotted registry name
    pub name: &'static str,
    /// Path below the service domain, without leading or trailing slash
    pub path: &'static str,
    pub method: HttpMethod,
    pub access: Access,
}

impl EndpointDescriptor {
    /// Full URL of this endpoint under `domain`.
    pub fn url(&self, domain: &str) -> String {
        format!("{}{}/", domain, self.path)
    }
}

pub const TASK_GET: &str = "api.majora.task.get";
pub const TASK_DELETE: &str = "api.majora.task.delete";

const fn legacy(name: &'static str, path: &'static str) -> EndpointDescriptor {
    EndpointDescriptor {
        name,
        path,
        method: HttpMethod::Post,
        access: Access::Legacy,
    }
}

const fn versioned(
    name: &'static str,
    path: &'static str,
    method: HttpMethod,
    version: ApiVersion,
    scope: Option<&'static str>,
) -> EndpointDescriptor {
    EndpointDescriptor {
        name,
        path,
        method,
        access: Access::Versioned { version, scope },
    }
}

const ENDPOINTS: &[EndpointDescriptor] = &[
    legacy("api.artifact.biosample.add", "api/v2/artifact/biosample/add"),
    legacy("api.artifact.biosample.get", "api/v2/artifact/biosample/get"),
    legacy("api.artifact.library.add", "api/v2/artifact/library/add"),
    legacy("api.artifact.file.add", "api/v2/artifact/file/add"),
    legacy("api.process.sequencing.add", "api/v2/process/sequencing/add"),
    legacy("api.pag.accession.add", "api/v2/pag/accession/add"),
    legacy("api.pag.qc.add", "api/v2/pag/qc/add"),
    versioned(
        "api.artifact.biosample.query.validity",
        "api/v2/artifact/biosample/query/validity",
        HttpMethod::Post,
        ApiVersion::V2,
        Some("majora2.view_biosampleartifact"),
    ),
    versioned(
        "api.pag.query.get",
        "api/v2/pag/query/get",
        HttpMethod::Post,
        ApiVersion::V2,
        Some("majora2.can_read_dataview_via_api"),
    ),
    versioned(
        "api.v0.dataview.get",
        "api/v0/dataview/get",
        HttpMethod::Post,
        ApiVersion::Experimental,
        Some("majora2.can_read_dataview_via_api"),
    ),
    versioned(
        "api.v3.artifact.biosample.get",
        "api/v3/artifact/biosample",
        HttpMethod::Get,
        ApiVersion::V3,
        Some("majora2.view_biosampleartifact"),
    ),
    versioned(
        "api.v3.pag.qc.get",
        "api/v3/pag/qc",
        HttpMethod::Get,
        ApiVersion::V3,
        Some("majora2.view_pagqcreport majora2.can_read_dataview_via_api"),
    ),
    versioned(
        "api.v3.process.sequencing.add",
        "api/v3/process/sequencing",
        HttpMethod::Post,
        ApiVersion::V3,
        Some("majora2.add_sequencingrun majora2.change_sequencingrun"),
    ),
    versioned(
        TASK_GET,
        "api/v2/majora/task/get",
        HttpMethod::Get,
        ApiVersion::V2,
        None,
    ),
    versioned(
        TASK_DELETE,
        "api/v2/majora/task/delete",
        HttpMethod::Post,
        ApiVersion::V2,
        None,
    ),
];

static REGISTRY: Lazy<HashMap<&'static str, &'static EndpointDescriptor>> =
    Lazy::new(|| ENDPOINTS.iter().map(|e| (e.name, e)).collect());

/// Look up an endpoint by its dotted name.
pub fn lookup(name: &str) -> Result<&'static EndpointDescriptor, UsageError> {
    REGISTRY
        .get(name)
        .copied()
        .ok_or_else(|| UsageError::UnknownEndpoint {
            name: name.to_string(),
        })
}

/// All registered endpoints, in declaration order.
pub fn all() -> &'static [EndpointDescriptor] {
    ENDPOINTS
}
