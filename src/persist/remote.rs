use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::persist::snapshot::{SNAPSHOT_EXTENSION, Snapshot};

/// One file returned by a remote snippet host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    pub content: String,
}

/// Fetches the files of a remote snippet (e.g. a gist) given a user-supplied reference.
pub trait SnippetSource {
    fn fetch(&self, reference: &str) -> anyhow::Result<Vec<RemoteFile>>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum RemoteSnippet {
    Single(Snapshot),
    /// Several snapshots; the caller picks one by name.
    Candidates(Vec<(String, Snapshot)>),
}

impl RemoteSnippet {
    /// Resolve to one snapshot. `name` is required when there are several candidates.
    pub fn choose(self, name: Option<&str>) -> InkdeckResult<Snapshot> {
        match (self, name) {
            (RemoteSnippet::Single(s), _) => Ok(s),
            (RemoteSnippet::Candidates(list), Some(name)) => list
                .into_iter()
                .find(|(n, _)| n == name)
                .map(|(_, s)| s)
                .ok_or_else(|| InkdeckError::fetch(format!("snippet has no file named '{name}'"))),
            (RemoteSnippet::Candidates(list), None) => Err(InkdeckError::fetch(format!(
                "snippet has {} candidate snapshots; pick one",
                list.len()
            ))),
        }
    }
}

/// Fetch and parse a remote snippet. Nothing here touches the document; every failure surfaces
/// as [`InkdeckError::ResourceFetch`].
pub fn load_remote(source: &dyn SnippetSource, reference: &str) -> InkdeckResult<RemoteSnippet> {
    let files = source
        .fetch(reference)
        .map_err(|e| InkdeckError::fetch(format!("{reference}: {e:#}")))?;

    let suffix = format!(".{SNAPSHOT_EXTENSION}");
    let decks: Vec<&RemoteFile> = files
        .iter()
        .filter(|f| f.name.to_ascii_lowercase().ends_with(&suffix))
        .collect();
    let decks = if decks.is_empty() {
        files.iter().collect()
    } else {
        decks
    };

    let mut parsed = Vec::with_capacity(decks.len());
    for f in decks {
        let snap = Snapshot::from_json(&f.content)
            .map_err(|e| InkdeckError::fetch(format!("{}: {e}", f.name)))?;
        parsed.push((f.name.clone(), snap));
    }
    match parsed.len() {
        0 => Err(InkdeckError::fetch(format!("{reference}: snippet is empty"))),
        1 => Ok(RemoteSnippet::Single(parsed.remove(0).1)),
        _ => Ok(RemoteSnippet::Candidates(parsed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::Document;
    use crate::fonts::FontRegistry;

    struct Fixed(anyhow::Result<Vec<RemoteFile>>);

    impl SnippetSource for Fixed {
        fn fetch(&self, _reference: &str) -> anyhow::Result<Vec<RemoteFile>> {
            match &self.0 {
                Ok(files) => Ok(files.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn deck_json(name: &str) -> String {
        let mut doc = Document::default();
        doc.set_filename(name);
        Snapshot::export(&doc, &FontRegistry::new())
            .to_json()
            .unwrap()
    }

    fn file(name: &str, content: String) -> RemoteFile {
        RemoteFile {
            name: name.to_owned(),
            content,
        }
    }

    #[test]
    fn single_file_is_single_snapshot() {
        let src = Fixed(Ok(vec![file("a.inkdeck", deck_json("a"))]));
        let snip = load_remote(&src, "gist/1").unwrap();
        assert!(matches!(&snip, RemoteSnippet::Single(s) if s.name == "a"));
    }

    #[test]
    fn several_decks_become_candidates() {
        let src = Fixed(Ok(vec![
            file("README.md", "# notes".to_owned()),
            file("a.inkdeck", deck_json("a")),
            file("b.inkdeck", deck_json("b")),
        ]));
        let snip = load_remote(&src, "gist/2").unwrap();
        let RemoteSnippet::Candidates(list) = &snip else {
            panic!("expected candidates");
        };
        assert_eq!(list.len(), 2);
        assert!(snip.clone().choose(None).is_err());
        assert_eq!(snip.choose(Some("b.inkdeck")).unwrap().name, "b");
    }

    #[test]
    fn failures_map_to_fetch_errors() {
        let down = Fixed(Err(anyhow::anyhow!("connection refused")));
        assert!(matches!(
            load_remote(&down, "gist/3"),
            Err(InkdeckError::ResourceFetch(_))
        ));
        let junk = Fixed(Ok(vec![file("x.inkdeck", "{".to_owned())]));
        assert!(matches!(
            load_remote(&junk, "gist/4"),
            Err(InkdeckError::ResourceFetch(_))
        ));
        let empty = Fixed(Ok(vec![]));
        assert!(load_remote(&empty, "gist/5").is_err());
    }
}
