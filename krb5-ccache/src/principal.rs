use crate::Error;
use anyhow::Context;
use std::{fmt, str::FromStr};

const REALM_SEP: char = '@';
const COMPONENT_SEP: char = '/';
const KRB5_TGS_NAME: &str = "krbtgt";
const KRB5_WELLKNOWN_NAMESTR: &str = "WELLKNOWN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name_type: NameType,
    pub realm: String,
    pub components: Vec<String>,
}

impl Principal {
    pub fn new(name_type: NameType, realm: &str, components: &[&str]) -> Self {
        Self {
            name_type,
            realm: realm.to_owned(),
            components: components.iter().map(|c| (*c).to_owned()).collect(),
        }
    }

    /// Parses `component[/component...]@REALM`. The realm is mandatory.
    pub fn parse_name(name: &str) -> anyhow::Result<Self> {
        let (components, realm) = name
            .split_once(REALM_SEP)
            .ok_or(Error::KRB5_PARSE_MALFORMED)
            .with_context(|| format!("principal {:?} has no realm", name))?;
        if realm.is_empty() || realm.contains(REALM_SEP) || realm.contains(COMPONENT_SEP) {
            Err(Error::KRB5_PARSE_MALFORMED)
                .with_context(|| format!("principal {:?} has an invalid realm", name))?
        }
        let components: Vec<String> = components
            .split(COMPONENT_SEP)
            .map(|c| c.to_owned())
            .collect();
        if components.iter().any(|c| c.is_empty()) {
            Err(Error::KRB5_PARSE_MALFORMED)
                .with_context(|| format!("principal {:?} has an empty component", name))?
        }
        let name_type = Self::infer_principal_type(&components);
        Ok(Self {
            name_type,
            realm: realm.to_owned(),
            components,
        })
    }

    fn infer_principal_type(components: &[String]) -> NameType {
        if components.len() == 2 && components[0] == KRB5_TGS_NAME {
            NameType::SRV_INST
        } else if components.len() >= 2 && components[0] == KRB5_WELLKNOWN_NAMESTR {
            NameType::WELLKNOWN
        } else {
            NameType::PRINCIPAL
        }
    }

    pub fn unparse_name(&self) -> String {
        format!("{}{}{}", self.components.join("/"), REALM_SEP, self.realm)
    }

    /// Whether `unparse_name` followed by `parse_name` gives back the same
    /// realm and components.
    pub fn is_well_formed(&self) -> bool {
        let bad_component = |c: &String| c.is_empty() || c.contains([COMPONENT_SEP, REALM_SEP]);
        !self.realm.is_empty()
            && !self.realm.contains([COMPONENT_SEP, REALM_SEP])
            && !self.components.is_empty()
            && !self.components.iter().any(bad_component)
    }

    /// The ticket-granting service principal `krbtgt/REALM@REALM`.
    pub fn tgs(realm: &str) -> Self {
        Self::new(NameType::SRV_INST, realm, &[KRB5_TGS_NAME, realm])
    }

    pub fn is_local_tgt(&self, realm: &str) -> bool {
        self.components.len() == 2
            && self.realm == realm
            && self.components[0] == KRB5_TGS_NAME
            && self.components[1] == realm
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unparse_name())
    }
}

impl FromStr for Principal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_name(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameType(pub i32);

macro_rules! name_type {
    ($name_type:ident, $int:expr) => {
        pub const $name_type: NameType = NameType($int);
    };
}

impl NameType {
    // Name type not known
    name_type!(UNKNOWN, 0);
    // Just the name of the principal as in DCE, or for users
    name_type!(PRINCIPAL, 1);
    // Service and other unique instance (krbtgt)
    name_type!(SRV_INST, 2);
    // Service with host name as instance (telnet, rcommands)
    name_type!(SRV_HST, 3);
    // Service with host as remaining components
    name_type!(SRV_XHST, 4);
    // Unique ID
    name_type!(UID, 5);
    // Windows 2000 UPN
    name_type!(ENTERPRISE_PRINCIPAL, 10);
    // Well-known (special) principal
    name_type!(WELLKNOWN, 11);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_principal() {
        let principal = Principal::parse_name("hdfs/host@REALM.COM").unwrap();
        assert_eq!(principal.realm, "REALM.COM");
        assert_eq!(principal.components, vec!["hdfs", "host"]);
        assert_eq!(principal.name_type, NameType::PRINCIPAL);
        assert_eq!(principal.to_string(), "hdfs/host@REALM.COM");
    }

    #[test]
    fn infers_tgs_name_type() {
        let principal: Principal = "krbtgt/REALM.COM@REALM.COM".parse().unwrap();
        assert_eq!(principal.name_type, NameType::SRV_INST);
        assert!(principal.is_local_tgt("REALM.COM"));
        assert!(!principal.is_local_tgt("OTHER.COM"));
        assert_eq!(principal, Principal::tgs("REALM.COM"));
    }

    #[test]
    fn missing_realm_is_a_descriptive_error() {
        let err = Principal::parse_name("noRealmHere").unwrap_err();
        assert!(Error::KRB5_PARSE_MALFORMED.matches(&err));
        assert!(err.to_string().contains("noRealmHere"));
    }

    #[test]
    fn rejects_malformed_names() {
        for name in ["user@", "a//b@REALM", "user@REALM@X", "@REALM", "u@RE/ALM"] {
            let err = Principal::parse_name(name).unwrap_err();
            assert!(Error::KRB5_PARSE_MALFORMED.matches(&err), "{}", name);
        }
    }

    #[test]
    fn well_formedness_mirrors_parsing() {
        assert!(Principal::new(NameType::PRINCIPAL, "R", &["a", "b"]).is_well_formed());
        assert!(!Principal::new(NameType::PRINCIPAL, "R", &[]).is_well_formed());
        assert!(!Principal::new(NameType::PRINCIPAL, "", &["a"]).is_well_formed());
        assert!(!Principal::new(NameType::PRINCIPAL, "R", &["a/b"]).is_well_formed());
    }
}
