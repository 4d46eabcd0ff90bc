//! Well-known names shared between drivers and the orchestrator.
//!
//! The orchestrator locates persisted state through these, so they must not
//! drift between driver variants.

/// Persisted cluster configuration
pub mod config_file {
    /// File name written next to the kube-config
    pub const FILE_NAME: &str = "config.yaml";

    /// Permission bits of the persisted config file
    pub const MODE: u32 = 0o644;

    /// Keys of the persisted mapping
    pub mod keys {
        pub const DATA_DIR: &str = "data-dir";
        pub const WRITE_KUBECONFIG: &str = "write-kubeconfig";
        pub const WRITE_KUBECONFIG_MODE: &str = "write-kubeconfig-mode";
        pub const DISABLE: &str = "disable";
    }
}

/// Release asset naming
pub mod release {
    /// Suffix appended to the distribution name for the image list asset
    pub const IMAGE_LIST_SUFFIX: &str = "-images.txt";
}

/// Install script materialization
pub mod script {
    /// Suffix appended to the distribution name for the script file
    pub const FILE_SUFFIX: &str = "-init.sh";

    /// Permission bits of the materialized script and installed binaries
    pub const EXEC_MODE: u32 = 0o755;

    /// Shell used to run the script
    pub const SHELL: &str = "/bin/sh";
}

/// Environment variables read when building default driver options
pub mod envs {
    pub const INSTALL_DIR: &str = "AIRGAP_DRIVER_INSTALL_DIR";
    pub const RELEASE_BASE: &str = "AIRGAP_DRIVER_RELEASE_BASE";
}

/// Lock file guarding a data directory against concurrent bootstraps
pub const LOCK_FILE: &str = ".lock";

/// Driver log files
pub mod logging {
    /// Prefix of the daily rotated log file; the appender adds a date suffix
    pub const FILE_PREFIX: &str = "airgap-driver.log";

    /// Filter used when `RUST_LOG` is unset or invalid
    pub const DEFAULT_FILTER: &str = "airgap_driver=info";
}
