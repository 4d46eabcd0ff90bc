/// Registry key and release asset name
pub const NAME: &str = "k3s";

/// Public release download location
pub const RELEASE_BASE: &str = "https://github.com/k3s-io/k3s/releases/download";

/// Built-in cluster configuration
pub mod defaults {
    pub const DATA_DIR: &str = "/var/lib/rancher/k3s";
    pub const KUBE_CONFIG: &str = "/etc/rancher/k3s/k3s.yaml";
    pub const KUBE_CONFIG_MODE: &str = "0644";
}

/// Variables understood by the k3s install script
pub mod install_env {
    pub const SKIP_DOWNLOAD: &str = "INSTALL_K3S_SKIP_DOWNLOAD";
    pub const SELINUX_WARN: &str = "INSTALL_K3S_SELINUX_WARN";
    pub const SKIP_SELINUX_RPM: &str = "INSTALL_K3S_SKIP_SELINUX_RPM";
    pub const BIN_DIR: &str = "INSTALL_K3S_BIN_DIR";
    pub const SKIP_START: &str = "INSTALL_K3S_SKIP_START";
}

/// Deployments that must be ready before the cluster accepts workloads
pub const SYSTEM_DEPLOYMENTS: &[(&str, &str)] = &[("kube-system", "coredns")];
