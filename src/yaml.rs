use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ManifestDocument {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ManifestDocument {
    pub fn summary(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{} {}/{} ({})", self.kind, namespace, self.name, self.api_version),
            None => format!("{} {} ({})", self.kind, self.name, self.api_version),
        }
    }
}

/// A manifest file staged for upload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ManifestPreview {
    pub path: PathBuf,
    pub file_name: String,
    pub contents: String,
    pub documents: Vec<ManifestDocument>,
}

impl ManifestPreview {
    pub fn bytes(&self) -> Vec<u8> {
        self.contents.as_bytes().to_vec()
    }
}

/// Parses every `---` separated document; empty documents are skipped.
pub fn parse_manifest(contents: &str) -> Result<Vec<ManifestDocument>> {
    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(contents).enumerate() {
        let value = YamlValue::deserialize(document)
            .with_context(|| format!("document {} is not valid YAML", index + 1))?;
        if value.is_null() {
            continue;
        }

        let field = |path: &[&str]| -> Option<String> {
            let mut current = &value;
            for key in path {
                current = current.get(*key)?;
            }
            current.as_str().map(str::to_string)
        };

        let Some(kind) = field(&["kind"]) else {
            bail!("document {} has no `kind`", index + 1);
        };
        let Some(name) = field(&["metadata", "name"]) else {
            bail!("document {} ({kind}) has no `metadata.name`", index + 1);
        };

        documents.push(ManifestDocument {
            api_version: field(&["apiVersion"]).unwrap_or_else(|| "v1".to_string()),
            kind,
            name,
            namespace: field(&["metadata", "namespace"]),
        });
    }

    if documents.is_empty() {
        bail!("manifest contains no resources");
    }
    Ok(documents)
}

pub fn load_manifest(path: &Path) -> Result<ManifestPreview> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let documents = parse_manifest(&contents)
        .with_context(|| format!("failed to parse manifest {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "manifest.yaml".to_string());

    Ok(ManifestPreview {
        path: path.to_path_buf(),
        file_name,
        contents,
        documents,
    })
}

#[cfg(test)]
mod tests {
    use super::{load_manifest, parse_manifest};
    use std::fs;

    #[test]
    fn parses_multi_document_manifest() {
        let documents = parse_manifest(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: api\n  namespace: prod\n---\n---\nkind: Service\nmetadata:\n  name: api\n",
        )
        .unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].summary(), "Deployment prod/api (apps/v1)");
        assert_eq!(documents[1].namespace, None);
        assert_eq!(documents[1].api_version, "v1");
    }

    #[test]
    fn rejects_documents_without_kind_or_name() {
        assert!(parse_manifest("metadata:\n  name: x\n").is_err());
        assert!(parse_manifest("kind: ConfigMap\n").is_err());
        assert!(parse_manifest("").is_err());
        assert!(parse_manifest("kind: [unclosed").is_err());
    }

    #[test]
    fn load_manifest_reads_file() {
        let path = std::env::temp_dir().join(format!("kubedeck-manifest-{}.yaml", std::process::id()));
        fs::write(&path, "kind: Namespace\nmetadata:\n  name: staging\n").unwrap();

        let preview = load_manifest(&path).unwrap();
        assert_eq!(preview.documents.len(), 1);
        assert!(preview.file_name.ends_with(".yaml"));
        assert_eq!(preview.bytes(), preview.contents.as_bytes());

        fs::remove_file(&path).unwrap();
    }
}
