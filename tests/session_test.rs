use std::fs;
use std::path::Path;
use std::rc::Rc;

use bikeshed_refs::config::{get_config_path, save_config, DocumentMetadata, RefsConfig};
use bikeshed_refs::errors::RefError;
use bikeshed_refs::linker::FAILED_ATTR;
use bikeshed_refs::messages::{DieOn, Level};
use bikeshed_refs::session::*;
use bikeshed_refs::store::MemorySource;
use bikeshed_refs::types::*;
use tempfile::TempDir;

const DOCUMENT: &str = r#"{
    "metadata": {"shortname": "css-foo", "level": 1, "status": "ED"},
    "dfns": [
        {"tag": "dfn", "attributes": {"id": "gizmo"}, "text": "gizmo", "line": 3}
    ],
    "autolinks": [
        {"tag": "a", "attributes": {"data-link-type": "dfn"}, "text": "gizmos", "line": 10},
        {"tag": "a", "attributes": {"data-link-type": "property"}, "text": "flex", "line": 11},
        {"tag": "a", "attributes": {"data-link-type": "biblio", "data-lt": "[[LOCAL-THING]]"}, "line": 12},
        {"tag": "a", "attributes": {"data-link-type": "biblio", "data-lt": "[[!DOM]]", "data-biblio-type": "normative"}, "line": 13},
        {"tag": "a", "attributes": {"data-link-type": "dfn"}, "text": "nowhere", "line": 14}
    ]
}"#;

fn write_spec_data(root: &Path) {
    let data = root.join("spec-data");
    fs::create_dir_all(data.join("anchors")).unwrap();
    fs::create_dir_all(data.join("biblio")).unwrap();
    fs::write(
        data.join("specs.json"),
        r#"{"css-flexbox-1": {"current_url": "https://drafts.csswg.org/css-flexbox-1/", "shortname": "css-flexbox", "level": 1}}"#,
    )
    .unwrap();
    fs::write(
        data.join("anchors/anchors-fl.json"),
        r#"{"flex": [{"kind": "property", "spec_id": "css-flexbox-1", "shortname": "css-flexbox", "level": 1,
            "current_url": "https://drafts.csswg.org/css-flexbox-1/#propdef-flex"}]}"#,
    )
    .unwrap();
    fs::write(
        data.join("biblio/biblio-do.data"),
        "%L DOM\n%T DOM Standard\n%U https://dom.spec.whatwg.org/\n",
    )
    .unwrap();
}

fn project(die_on: DieOn) -> TempDir {
    let temp = TempDir::new().unwrap();
    write_spec_data(temp.path());
    let config = RefsConfig {
        data_dir: "spec-data".to_string(),
        die_on,
        ..RefsConfig::default()
    };
    save_config(temp.path(), &config).unwrap();
    fs::write(
        temp.path().join(LOCAL_BIBLIO_FILE),
        r#"{"LOCAL-THING": {"title": "A Local Thing", "href": "https://local.example/"}}"#,
    )
    .unwrap();
    temp
}

#[test]
fn test_init_writes_config() {
    let temp = TempDir::new().unwrap();
    assert!(!LinkSession::is_initialized(temp.path()));
    let session = LinkSession::init(temp.path()).unwrap();
    assert!(LinkSession::is_initialized(temp.path()));
    assert!(get_config_path(temp.path()).exists());
    assert_eq!(session.project_root(), temp.path());
}

#[test]
fn test_open_without_spec_data() {
    let temp = TempDir::new().unwrap();
    let config = RefsConfig {
        data_dir: "no-such-dir".to_string(),
        ..RefsConfig::default()
    };
    save_config(temp.path(), &config).unwrap();
    match LinkSession::open(temp.path()) {
        Err(RefError::MissingData { message, hint }) => {
            assert!(message.contains("no-such-dir"));
            assert!(hint.contains("data_dir"));
        }
        Err(other) => panic!("expected MissingData, got {other:?}"),
        Ok(_) => panic!("expected MissingData"),
    }
}

#[test]
fn test_link_document() {
    let temp = project(DieOn::Fatal);
    let session = LinkSession::open(temp.path()).unwrap();
    assert_eq!(session.config().data_dir, "spec-data");

    let document: Document = serde_json::from_str(DOCUMENT).unwrap();
    let result = session.link_document(document).unwrap();

    assert_eq!(result.report.definitions, 1);
    assert_eq!(result.report.resolved, 4);
    assert_eq!(result.report.failed, 1);
    assert_eq!(result.report.biblio, 2);
    assert!(!result.aborted);

    let links = &result.document.autolinks;
    assert_eq!(links[0].attr("href"), Some("#gizmo"));
    assert_eq!(
        links[1].attr("href"),
        Some("https://drafts.csswg.org/css-flexbox-1/#propdef-flex")
    );
    assert_eq!(links[2].attr("href"), Some("#biblio-local-thing"));
    assert_eq!(links[2].text, "[LOCAL-THING]");
    assert!(links[4].attr(FAILED_ATTR).is_some());

    assert_eq!(result.specs_used, vec![("css-flexbox-1".to_string(), true)]);
    // The flexbox autolink cites its spec even without bibliography data.
    assert_eq!(result.normative_references.len(), 2);
    assert_eq!(result.normative_references[0].key, "css-flexbox-1");
    assert!(result.normative_references[0].generated);
    assert_eq!(
        result.normative_references[0].url.as_deref(),
        Some("https://drafts.csswg.org/css-flexbox-1/")
    );
    assert_eq!(result.normative_references[1].title, "DOM Standard");
    assert_eq!(result.informative_references.len(), 1);
    assert_eq!(result.informative_references[0].url.as_deref(), Some("https://local.example/"));

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].level, Level::LinkError);
    assert_eq!(result.diagnostics[0].line, Some(14));

    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"normative_references\""));
}

#[test]
fn test_die_on_link_error_aborts() {
    let temp = project(DieOn::LinkError);
    let session = LinkSession::open(temp.path()).unwrap();
    let document: Document = serde_json::from_str(DOCUMENT).unwrap();
    let result = session.link_document(document).unwrap();
    assert!(result.aborted);
    // Every link is still processed.
    assert_eq!(result.report.resolved, 4);
}

#[test]
fn test_session_over_memory_source() {
    let temp = TempDir::new().unwrap();
    let source = MemorySource::new().with_file("specs.json", "{}");
    let session = LinkSession::with_source(temp.path(), RefsConfig::default(), Rc::new(source));

    let metadata = DocumentMetadata {
        shortname: "css-foo".to_string(),
        ..DocumentMetadata::default()
    };
    let mut resolver = session.resolver(&metadata).unwrap();
    resolver.seal();
    let missing = resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "anything"));
    assert!(matches!(missing, Err(RefError::NotFound { .. })));
}

#[test]
fn test_resolver_requires_specs_table() {
    let temp = TempDir::new().unwrap();
    let session = LinkSession::with_source(
        temp.path(),
        RefsConfig::default(),
        Rc::new(MemorySource::new()),
    );
    assert!(matches!(
        session.resolver(&DocumentMetadata::default()),
        Err(RefError::MissingData { .. })
    ));
}
