use std::{fmt, str::FromStr};

use kube::{Resource, ResourceExt};

use crate::{Error, Result};

/// Identity of a namespaced resource, rendered as `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub namespace: String,
    pub name: String,
}

impl Key {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_resource<K: Resource>(obj: &K) -> Result<Self> {
        let name = obj.meta().name.clone().ok_or(Error::UnnamedObject)?;
        Ok(Self::new(obj.namespace().unwrap_or_default(), name))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ns), Some(name), None) if !ns.is_empty() && !name.is_empty() => {
                Ok(Self::new(ns, name))
            }
            _ => Err(Error::InvalidKey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    use super::*;

    #[test]
    fn test_key_display_and_parse() {
        let key = Key::new("ns", "foo");
        assert_eq!(key.to_string(), "ns/foo");
        assert_eq!("ns/foo".parse::<Key>().expect("valid key"), key);
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for raw in ["", "foo", "/foo", "ns/", "a/b/c"] {
            assert!(raw.parse::<Key>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_key_from_resource() {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("foo".into()),
                namespace: Some("ns".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(Key::from_resource(&cm).expect("key"), Key::new("ns", "foo"));
        assert!(Key::from_resource(&ConfigMap::default()).is_err());
    }
}
