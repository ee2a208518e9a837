//! Endpoint table
//!
//! Where each component kind lives in the instance's REST API. Keystore and
//! package listings are shaped differently and are special-cased by the
//! provider; every other kind is fully described here.

use tributary_core::domain::ComponentKind;

/// How an existing object is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStyle {
    /// `PUT {item}/{id}`
    Item,
    /// `PUT {create}` with the id carried in the body
    Collection,
    /// The kind cannot be updated in place
    Unsupported,
}

/// How an object is found by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameLookup {
    /// List everything and match on name
    Scan,
    /// `GET {item}/{name}`
    Item,
    /// `GET {segments}?{param}={name}`
    Query {
        segments: &'static [&'static str],
        param: &'static str,
    },
    /// `GET {segments}?searchFieldName=name&searchValue={name}`
    Search { segments: &'static [&'static str] },
}

/// REST layout for one component kind
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub list: &'static [&'static str],
    pub item: &'static [&'static str],
    pub create: &'static [&'static str],
    pub update: UpdateStyle,
    pub lookup: NameLookup,
    /// Keys that may wrap a list response, tried in order
    pub envelope: &'static [&'static str],
}

const NO_ENVELOPE: &[&str] = &[];

/// Endpoint layout for `kind`
pub fn endpoint(kind: ComponentKind) -> Endpoint {
    use ComponentKind::*;
    match kind {
        Keystore => Endpoint {
            list: &["credentials"],
            item: &["credentials"],
            create: &["credentials"],
            update: UpdateStyle::Unsupported,
            lookup: NameLookup::Item,
            envelope: NO_ENVELOPE,
        },
        Package => Endpoint {
            list: &["pip", "packages"],
            item: &["pip", "packages"],
            create: &["pip", "packages"],
            update: UpdateStyle::Unsupported,
            lookup: NameLookup::Scan,
            envelope: NO_ENVELOPE,
        },
        Plugin => Endpoint {
            list: &["task", "packages"],
            item: &["task", "packages"],
            create: &["task", "packages"],
            update: UpdateStyle::Unsupported,
            lookup: NameLookup::Item,
            envelope: NO_ENVELOPE,
        },
        Asset => simple(&["asset"]),
        Workspace => simple(&["workspaces"]),
        Applet => simple(&["applet"]),
        Application => Endpoint {
            list: &["app"],
            item: &["app"],
            create: &["app"],
            update: UpdateStyle::Collection,
            lookup: NameLookup::Scan,
            envelope: NO_ENVELOPE,
        },
        Task => Endpoint {
            list: &["task", "list"],
            item: &["task"],
            create: &["task"],
            update: UpdateStyle::Item,
            lookup: NameLookup::Scan,
            envelope: &["tasks"],
        },
        Report => simple(&["reports"]),
        Dashboard => simple(&["dashboard"]),
        User => Endpoint {
            list: &["user", "light"],
            item: &["user"],
            create: &["user"],
            update: UpdateStyle::Item,
            lookup: NameLookup::Query {
                segments: &["user", "lookup"],
                param: "name",
            },
            envelope: &["users", "items"],
        },
        Group => Endpoint {
            list: &["groups"],
            item: &["groups"],
            create: &["groups"],
            update: UpdateStyle::Item,
            lookup: NameLookup::Scan,
            envelope: &["items", "groups"],
        },
        Role => Endpoint {
            list: &["roles"],
            item: &["roles"],
            create: &["roles"],
            update: UpdateStyle::Item,
            lookup: NameLookup::Search { segments: &["roles", ""] },
            envelope: &["items"],
        },
    }
}

fn simple(base: &'static [&'static str]) -> Endpoint {
    Endpoint {
        list: base,
        item: base,
        create: base,
        update: UpdateStyle::Item,
        lookup: NameLookup::Scan,
        envelope: NO_ENVELOPE,
    }
}

/// Workflow endpoints, keyed by owning application id
pub const WORKFLOW: &[&str] = &["workflow", ""];

/// Platform version endpoint
pub const VERSION: &[&str] = &["settings", "version"];

/// Plugin bundle download
pub const BUNDLE_DOWNLOAD: &[&str] = &["attachment", "download"];

/// Plugin upgrade upload
pub const PLUGIN_UPGRADE: &[&str] = &["task", "packages", "upgrade"];

/// Python interpreter labels that partition the package listing
pub const PYTHON_VERSIONS: &[&str] = &["Python2_7", "Python3_6", "Python3"];
