//! The ten logical inventory keys and their fact-source/URL/coercion
//! tables, grounded in the original agent's `COMMIT_DEFS` table.

use crate::coercion::Coercion;

/// One of the ten logical keys an inventory snapshot is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactKey {
    Server,
    Info,
    Os,
    Time,
    Groups,
    Users,
    Interfaces,
    Addresses,
    Packages,
    PyPackages,
}

impl FactKey {
    pub const ALL: [FactKey; 10] = [
        FactKey::Server,
        FactKey::Info,
        FactKey::Os,
        FactKey::Time,
        FactKey::Groups,
        FactKey::Users,
        FactKey::Interfaces,
        FactKey::Addresses,
        FactKey::Packages,
        FactKey::PyPackages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FactKey::Server => "server",
            FactKey::Info => "info",
            FactKey::Os => "os",
            FactKey::Time => "time",
            FactKey::Groups => "groups",
            FactKey::Users => "users",
            FactKey::Interfaces => "interfaces",
            FactKey::Addresses => "addresses",
            FactKey::Packages => "packages",
            FactKey::PyPackages => "pypackages",
        }
    }

    pub fn from_str(s: &str) -> Option<FactKey> {
        FactKey::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn def(self) -> &'static FactDef {
        match self {
            FactKey::Server => &SERVER_DEF,
            FactKey::Info => &INFO_DEF,
            FactKey::Os => &OS_DEF,
            FactKey::Time => &TIME_DEF,
            FactKey::Groups => &GROUPS_DEF,
            FactKey::Users => &USERS_DEF,
            FactKey::Interfaces => &INTERFACES_DEF,
            FactKey::Addresses => &ADDRESSES_DEF,
            FactKey::Packages => &PACKAGES_DEF,
            FactKey::PyPackages => &PYPACKAGES_DEF,
        }
    }
}

/// A key's fact source, remote collection/sync URLs, primary key field, and
/// type-coercion table. `sql` is `None` for the two keys that don't map
/// straight onto one query (`server` composes two; `pypackages` is answered
/// by shelling out to `pip3 list` rather than the fact-query tool).
#[derive(Debug)]
pub struct FactDef {
    pub key: FactKey,
    pub sql: Option<&'static str>,
    pub multirow: bool,
    pub pk: &'static str,
    pub collect_url: &'static str,
    /// Suffix appended to `collect_url` to reach the sync-snapshot endpoint;
    /// singleton keys use `-/sync/`, multi-row keys use `sync/`.
    pub sync_suffix: &'static str,
    pub coercions: &'static [(&'static str, Coercion)],
}

impl FactDef {
    pub fn sync_url(&self) -> String {
        format!("{}{}", self.collect_url, self.sync_suffix)
    }
}

static SERVER_DEF: FactDef = FactDef {
    key: FactKey::Server,
    sql: None,
    multirow: false,
    pk: "version",
    collect_url: "/api/servers/servers/",
    sync_suffix: "-/sync/",
    coercions: &[("load", Coercion::Float)],
};

static INFO_DEF: FactDef = FactDef {
    key: FactKey::Info,
    sql: Some(
        "SELECT uuid, cpu_type, cpu_subtype, cpu_brand, cpu_physical_cores, cpu_logical_cores, \
         physical_memory, hardware_vendor, hardware_model, hardware_version, hardware_serial, \
         computer_name, hostname, local_hostname FROM system_info",
    ),
    multirow: false,
    pk: "uuid",
    collect_url: "/api/proc/info/",
    sync_suffix: "-/sync/",
    coercions: &[
        ("cpu_logical_cores", Coercion::Int),
        ("cpu_physical_cores", Coercion::Int),
        ("physical_memory", Coercion::Int),
        ("uuid", Coercion::Uuid),
    ],
};

static OS_DEF: FactDef = FactDef {
    key: FactKey::Os,
    sql: Some("SELECT name, version, major, minor, patch, build, platform, platform_like FROM os_version"),
    multirow: false,
    pk: "name",
    collect_url: "/api/proc/os/",
    sync_suffix: "-/sync/",
    coercions: &[
        ("major", Coercion::Int),
        ("minor", Coercion::Int),
        ("patch", Coercion::Int),
    ],
};

static TIME_DEF: FactDef = FactDef {
    key: FactKey::Time,
    sql: Some("SELECT datetime, local_timezone AS timezone, total_seconds AS uptime FROM time INNER JOIN uptime"),
    multirow: false,
    pk: "timezone",
    collect_url: "/api/proc/time/",
    sync_suffix: "-/sync/",
    coercions: &[("uptime", Coercion::Int)],
};

static GROUPS_DEF: FactDef = FactDef {
    key: FactKey::Groups,
    sql: Some("SELECT gid_signed AS gid, groupname FROM groups"),
    multirow: true,
    pk: "gid",
    collect_url: "/api/proc/groups/",
    sync_suffix: "sync/",
    coercions: &[("gid", Coercion::Int)],
};

static USERS_DEF: FactDef = FactDef {
    key: FactKey::Users,
    sql: Some(
        "SELECT uid_signed AS uid, gid_signed AS gid, username, description, directory, shell FROM users",
    ),
    multirow: true,
    pk: "uid",
    collect_url: "/api/proc/users/",
    sync_suffix: "sync/",
    coercions: &[("gid", Coercion::Int), ("uid", Coercion::Int)],
};

static INTERFACES_DEF: FactDef = FactDef {
    key: FactKey::Interfaces,
    sql: Some("SELECT interface AS name, mac, type, flags, mtu, link_speed FROM interface_details"),
    multirow: true,
    pk: "name",
    collect_url: "/api/proc/interfaces/",
    sync_suffix: "sync/",
    coercions: &[
        ("type", Coercion::Int),
        ("flags", Coercion::Int),
        ("mtu", Coercion::Int),
        ("link_speed", Coercion::Int),
    ],
};

static ADDRESSES_DEF: FactDef = FactDef {
    key: FactKey::Addresses,
    sql: Some(
        "SELECT interface AS interface_name, address, mask, broadcast FROM interface_addresses \
         WHERE address NOT LIKE 'fe80%'",
    ),
    multirow: true,
    pk: "address",
    collect_url: "/api/proc/addresses/",
    sync_suffix: "sync/",
    coercions: &[],
};

/// The platform-specific `packages` query is selected at collection time
/// by `alpamon_core::Platform::detect` rather than baked into this table.
static PACKAGES_DEF: FactDef = FactDef {
    key: FactKey::Packages,
    sql: None,
    multirow: true,
    pk: "name",
    collect_url: "/api/proc/packages/",
    sync_suffix: "sync/",
    coercions: &[],
};

static PYPACKAGES_DEF: FactDef = FactDef {
    key: FactKey::PyPackages,
    sql: None,
    multirow: true,
    pk: "name",
    collect_url: "/api/proc/pypackages/",
    sync_suffix: "sync/",
    coercions: &[],
};

/// The per-platform `packages` query, mirrored from `COMMIT_DEFS['packages']`.
pub fn packages_sql(platform: alpamon_core::Platform) -> Option<&'static str> {
    use alpamon_core::Platform;
    match platform {
        Platform::Darwin => Some("SELECT name, path AS source, version FROM homebrew_packages"),
        Platform::Debian => Some("SELECT name, source, arch, version FROM deb_packages"),
        Platform::Rhel => Some("SELECT name, source, arch, version FROM rpm_packages"),
        Platform::Windows => None,
    }
}
