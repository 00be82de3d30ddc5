// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Default label/annotation values used by barrelman
pub mod labels {
    /// Key shared by the managed-resource label and the ignore annotation
    pub const KEY: &str = "tfw.io/barrelman";
    /// Label value marking local objects created by barrelman
    pub const MANAGED_RESOURCE: &str = "managed-resource";
    /// Annotation value excluding a remote service from mirroring
    pub const IGNORE: &str = "ignore";
    /// Label value opting a hand-made local service into endpoint mirroring
    pub const UPSTREAM: &str = "true";
}

/// Names the two reconciliation loops report under (logs and metrics)
pub mod controllers {
    pub const ENDPOINTS: &str = "NodeEndpointController";
    pub const SERVICES: &str = "ServiceController";
}

/// Namespaces ignored unless removed via configuration
pub const DEFAULT_IGNORED_NAMESPACES: &[&str] = &["kube-system"];

/// Work queue retry backoff
pub mod backoff {
    /// Delay before the first retry of a failing key
    pub const BASE_DELAY_MS: u64 = 5;
    /// Ceiling for the per-key exponential delay
    pub const MAX_DELAY_SECS: u64 = 1000;
}

/// Defaults for the configuration surface
pub mod defaults {
    pub const RESYNC_PERIOD_SECS: u64 = 2 * 60 * 60;
    pub const ENDPOINT_WORKERS: usize = 4;
    pub const SERVICE_WORKERS: usize = 2;
}
