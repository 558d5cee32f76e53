use crate::profile::{ServerConfig, ServerMap};
use crate::validation::validate_document;
use crate::SchemaError;
use serde_json::{Map, Value};

/// Top-level key under which the host application reads its server map.
pub const SERVERS_KEY: &str = "mcpServers";

/// The on-disk document the host application consumes at startup.
///
/// Only the server map is interpreted. Every other top-level key is carried
/// through untouched, in its original order, so a switch never loses settings
/// this tool does not understand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostConfiguration {
    document: Map<String, Value>,
}

impl HostConfiguration {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from an untyped JSON value, rejecting documents that fail
    /// structural validation.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let report = validate_document(&value);
        if !report.valid {
            return Err(SchemaError::MalformedDocument(report.error_summary()));
        }
        match value {
            Value::Object(document) => Ok(Self { document }),
            _ => Err(SchemaError::MalformedDocument(
                "configuration must be a JSON object".to_owned(),
            )),
        }
    }

    pub fn parse(content: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Typed view of the server map. Missing key means no servers.
    pub fn servers(&self) -> Result<ServerMap, SchemaError> {
        match self.document.get(SERVERS_KEY) {
            None | Some(Value::Null) => Ok(ServerMap::new()),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }

    /// `(server, key)` for every key in a server entry that the typed view
    /// from [`servers`](Self::servers) does not keep, such as `url` or `cwd`.
    pub fn unsupported_server_fields(&self) -> Vec<(String, String)> {
        let Some(Value::Object(servers)) = self.document.get(SERVERS_KEY) else {
            return Vec::new();
        };
        servers
            .iter()
            .filter_map(|(name, entry)| entry.as_object().map(|fields| (name, fields)))
            .flat_map(|(name, fields)| {
                fields
                    .keys()
                    .filter(|key| !ServerConfig::FIELDS.contains(&key.as_str()))
                    .map(move |key| (name.clone(), key.clone()))
            })
            .collect()
    }

    /// Return a copy whose server map is replaced by `servers`; all sibling
    /// keys keep their values and positions.
    pub fn with_servers(&self, servers: &ServerMap) -> Result<Self, SchemaError> {
        let mut document = self.document.clone();
        let encoded = serde_json::to_value(servers)?;
        // insert() on an existing key keeps its position under preserve_order.
        document.insert(SERVERS_KEY.to_owned(), encoded);
        Ok(Self { document })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.document.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.document
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.document)
    }

    /// Pretty JSON with a trailing newline, the form written to disk.
    pub fn to_pretty_json(&self) -> Result<String, SchemaError> {
        let mut out = serde_json::to_string_pretty(&self.document)?;
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ServerConfig;
    use serde_json::json;

    fn git_servers() -> ServerMap {
        let mut servers = ServerMap::new();
        servers.insert(
            "git".to_owned(),
            ServerConfig::new("npx").with_args(["-y", "server-git"]),
        );
        servers
    }

    #[test]
    fn unsupported_server_fields_are_listed() {
        let doc = HostConfiguration::from_value(json!({
            "mcpServers": {
                "git": {"command": "npx", "args": [], "cwd": "/src"},
                "remote": {"type": "sse", "url": "http://localhost:3000"}
            }
        }))
        .unwrap();
        assert_eq!(
            doc.unsupported_server_fields(),
            vec![
                ("git".to_owned(), "cwd".to_owned()),
                ("remote".to_owned(), "type".to_owned()),
                ("remote".to_owned(), "url".to_owned()),
            ]
        );
        assert!(HostConfiguration::empty().unsupported_server_fields().is_empty());
    }

    #[test]
    fn merge_preserves_unrelated_keys() {
        let doc = HostConfiguration::from_value(json!({
            "foo": 1,
            "mcpServers": {"old": {"command": "node", "args": []}},
            "theme": {"dark": true}
        }))
        .unwrap();

        let merged = doc.with_servers(&git_servers()).unwrap();
        assert_eq!(merged.get("foo"), Some(&json!(1)));
        assert_eq!(merged.get("theme"), Some(&json!({"dark": true})));
        assert_eq!(
            merged.get(SERVERS_KEY),
            Some(&json!({"git": {"command": "npx", "args": ["-y", "server-git"]}}))
        );
        let keys: Vec<_> = merged.keys().collect();
        assert_eq!(keys, vec!["foo", "mcpServers", "theme"]);
    }

    #[test]
    fn merge_into_empty_document() {
        let merged = HostConfiguration::empty()
            .with_servers(&git_servers())
            .unwrap();
        assert_eq!(
            merged.into_value(),
            json!({"mcpServers": {"git": {"command": "npx", "args": ["-y", "server-git"]}}})
        );
    }

    #[test]
    fn missing_server_map_reads_as_empty() {
        let doc = HostConfiguration::from_value(json!({"foo": 1})).unwrap();
        assert!(doc.servers().unwrap().is_empty());
    }

    #[test]
    fn rejects_non_object_document() {
        assert!(HostConfiguration::from_value(json!([1, 2, 3])).is_err());
        assert!(HostConfiguration::parse("\"text\"").is_err());
    }

    #[test]
    fn rejects_server_map_of_wrong_type() {
        let err = HostConfiguration::from_value(json!({"mcpServers": []})).unwrap_err();
        assert!(err.to_string().contains("mcpServers"));
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert!(matches!(
            HostConfiguration::parse("{not json"),
            Err(SchemaError::Json(_))
        ));
    }

    #[test]
    fn pretty_json_ends_with_newline() {
        let doc = HostConfiguration::from_value(json!({"a": 1})).unwrap();
        let text = doc.to_pretty_json().unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(HostConfiguration::parse(&text).unwrap(), doc);
    }
}
