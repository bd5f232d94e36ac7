//! The fixed catalogs of deployable components.
//!
//! Components are never created at runtime, only selected. Each catalog is a
//! closed enum so validation and the list of known names cannot drift apart.

use derive_more::Display;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::Error;

/// A closed set of selectable identifiers.
pub trait Catalog: Copy + Eq + 'static {
    /// Human-readable name of the catalog, used in error messages.
    const KIND: &'static str;

    /// Every member, in deployment order.
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// Look up a member by its identifier.
    fn lookup(value: &str) -> Result<Self, Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|member| member.as_str() == value)
            .ok_or_else(|| Error::UnknownIdentifier {
                catalog: Self::KIND,
                value: value.to_string(),
                expected: Self::ALL
                    .iter()
                    .map(|member| member.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Which overlay path convention a component follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[display("controller")]
    Controller,
    #[display("app")]
    App,
}

impl Role {
    fn root_dir(&self) -> &'static str {
        match self {
            Role::Controller => "controllers",
            Role::App => "apps",
        }
    }

    /// Overlay rendered and applied for a component, relative to its root.
    fn overlay_dir(&self) -> &'static str {
        match self {
            Role::Controller => "config/default",
            Role::App => "deploy/overlays/local",
        }
    }

    /// Directory holding the kustomization that carries the image pin.
    fn pin_dir(&self) -> &'static str {
        match self {
            Role::Controller => "config/manager",
            Role::App => "deploy/overlays/local",
        }
    }
}

/// Controller-style components (operators deployed cluster-wide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ControllerComponent {
    #[display("tenant-controller")]
    Tenant,
    #[display("quota-controller")]
    Quota,
    #[display("backup-controller")]
    Backup,
}

impl Catalog for ControllerComponent {
    const KIND: &'static str = "controller";
    const ALL: &'static [Self] = &[Self::Tenant, Self::Quota, Self::Backup];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant-controller",
            Self::Quota => "quota-controller",
            Self::Backup => "backup-controller",
        }
    }
}

impl FromStr for ControllerComponent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s)
    }
}

/// App-style components (workloads deployed through a local overlay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AppComponent {
    #[display("console")]
    Console,
    #[display("api")]
    Api,
    #[display("worker")]
    Worker,
}

impl Catalog for AppComponent {
    const KIND: &'static str = "app";
    const ALL: &'static [Self] = &[Self::Console, Self::Api, Self::Worker];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Api => "api",
            Self::Worker => "worker",
        }
    }
}

impl FromStr for AppComponent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s)
    }
}

/// A selected component together with the paths its role implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    name: &'static str,
    role: Role,
}

impl Component {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Source tree of the component, also used as its build context.
    pub fn source_dir(&self, repo: &Path) -> PathBuf {
        repo.join(self.role.root_dir()).join(self.name)
    }

    /// Build descriptor declaring the `IMG` variable.
    pub fn descriptor(&self, repo: &Path) -> PathBuf {
        self.source_dir(repo).join("Makefile")
    }

    /// Kustomization document that receives the image pin.
    pub fn document(&self, repo: &Path) -> PathBuf {
        self.source_dir(repo)
            .join(self.role.pin_dir())
            .join("kustomization.yaml")
    }

    /// Overlay rendered into the manifest stream that gets applied.
    pub fn overlay(&self, repo: &Path) -> PathBuf {
        self.source_dir(repo).join(self.role.overlay_dir())
    }
}

impl From<ControllerComponent> for Component {
    fn from(component: ControllerComponent) -> Self {
        Self {
            name: component.as_str(),
            role: Role::Controller,
        }
    }
}

impl From<AppComponent> for Component {
    fn from(component: AppComponent) -> Self {
        Self {
            name: component.as_str(),
            role: Role::App,
        }
    }
}
