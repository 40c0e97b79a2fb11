use std::collections::HashMap;
use std::rc::Rc;

use bikeshed_refs::config::{DocumentMetadata, RefsConfig};
use bikeshed_refs::errors::{FailureStage, RefError};
use bikeshed_refs::index::LocalDefinition;
use bikeshed_refs::messages::Level;
use bikeshed_refs::resolution::{BiblioRequest, ReferenceResolver, ResolverState};
use bikeshed_refs::store::{BiblioStore, DataSource, ExternalAnchorStore, MemorySource};
use bikeshed_refs::types::*;

/// An external anchor in `spec_id`, whose shortname is the spec id with any
/// trailing `-<level>` removed.
fn anchor(text: &str, kind: DfnType, spec_id: &str, current: Option<&str>, snapshot: Option<&str>) -> Candidate {
    let (shortname, level) = match spec_id.rsplit_once('-') {
        Some((short, lvl)) if lvl.chars().all(|c| c.is_ascii_digit()) => {
            (short.to_string(), SpecLevel::parse(lvl))
        }
        _ => (spec_id.to_string(), None),
    };
    Candidate {
        text: text.to_string(),
        kind,
        origin: Origin::External {
            spec_id: spec_id.to_string(),
            shortname,
            level,
            urls: CandidateUrls {
                current: current.map(|s| s.to_string()),
                snapshot: snapshot.map(|s| s.to_string()),
            },
        },
        for_scope: Default::default(),
        exported: true,
        normative: true,
    }
}

fn spec(current: Option<&str>, snapshot: Option<&str>) -> SpecData {
    SpecData {
        current_url: current.map(|s| s.to_string()),
        snapshot_url: snapshot.map(|s| s.to_string()),
        ..SpecData::default()
    }
}

fn test_config() -> RefsConfig {
    RefsConfig {
        replaced_specs: vec![("css21".to_string(), "css-display-3".to_string())],
        ..RefsConfig::default()
    }
}

fn build(
    specs: Vec<(&str, SpecData)>,
    anchors: Vec<Candidate>,
    config: &RefsConfig,
    metadata: &DocumentMetadata,
    source: MemorySource,
) -> ReferenceResolver {
    let source: Rc<dyn DataSource> = Rc::new(source);
    let mut store = ExternalAnchorStore::with_specs(source.clone(), HashMap::new());
    for (id, data) in specs {
        store.add_spec(id, data);
    }
    for a in anchors {
        store.add_candidate(a);
    }
    let biblio = BiblioStore::empty(source);
    ReferenceResolver::new(store, biblio, config, metadata)
}

fn resolver_with(specs: Vec<(&str, SpecData)>, anchors: Vec<Candidate>) -> ReferenceResolver {
    build(
        specs,
        anchors,
        &test_config(),
        &DocumentMetadata::default(),
        MemorySource::new(),
    )
}

fn sealed(mut resolver: ReferenceResolver) -> ReferenceResolver {
    resolver.seal();
    resolver
}

fn stage_of(result: bikeshed_refs::errors::Result<ResolvedRef>) -> FailureStage {
    match result {
        Err(RefError::NotFound { stage, .. }) => stage,
        other => panic!("expected NotFound, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[test]
fn test_get_ref_before_seal_is_a_phase_error() {
    let mut resolver = resolver_with(vec![], vec![]);
    assert_eq!(resolver.state(), ResolverState::Collecting);
    let err = resolver
        .get_ref(&LinkRequest::new(DfnType::Dfn, "widget"))
        .unwrap_err();
    assert!(matches!(err, RefError::Phase { .. }));
}

#[test]
fn test_add_definition_after_resolution_started_is_a_phase_error() {
    let mut resolver = sealed(resolver_with(vec![], vec![]));
    assert_eq!(resolver.state(), ResolverState::Sealed);
    let _ = resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "widget").silent());
    assert_eq!(resolver.state(), ResolverState::Resolving);

    let err = resolver
        .add_local_definition(&LocalDefinition::new("widget", DfnType::Dfn, "widget"))
        .unwrap_err();
    assert!(matches!(err, RefError::Phase { .. }));
}

// ---------------------------------------------------------------------------
// Resolution properties
// ---------------------------------------------------------------------------

#[test]
fn test_resolution_is_idempotent() {
    let mut resolver = sealed(resolver_with(
        vec![("css-foo-1", spec(Some("https://ed/foo/"), None))],
        vec![
            anchor("thing", DfnType::Dfn, "css-foo-1", Some("https://ed/foo/#thing"), None),
            anchor("thing", DfnType::Dfn, "dom", Some("https://dom/#thing"), None),
        ],
    ));
    let req = LinkRequest::new(DfnType::Dfn, "thing");
    let first = resolver.get_ref(&req).unwrap();
    let second = resolver.get_ref(&req).unwrap();
    assert_eq!(first.url, second.url);
    // The ambiguity warning is only emitted once.
    assert_eq!(resolver.messages().count(Level::Warning), 1);
}

#[test]
fn test_local_definition_takes_precedence() {
    let mut resolver = resolver_with(
        vec![("css-foo-1", spec(Some("https://ed/foo/"), Some("https://tr/foo/")))],
        vec![anchor(
            "widget",
            DfnType::Dfn,
            "css-foo-1",
            Some("https://ed/foo/#widget"),
            Some("https://tr/foo/#widget"),
        )],
    );
    resolver
        .add_local_definition(&LocalDefinition::new("widget", DfnType::Dfn, "widget"))
        .unwrap();
    resolver.seal();

    let plain = resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "widget")).unwrap();
    assert_eq!(plain.url, "#widget");
    assert!(plain.candidate.is_local());

    let explicit = resolver
        .get_ref(
            &LinkRequest::new(DfnType::Dfn, "widget")
                .with_spec("css-foo-1")
                .with_status(Status::Snapshot),
        )
        .unwrap();
    assert_eq!(explicit.url, "#widget");
}

#[test]
fn test_duplicate_local_definitions_are_rejected() {
    let mut resolver = resolver_with(vec![], vec![]);
    resolver
        .add_local_definition(&LocalDefinition::new("widget", DfnType::Dfn, "widget"))
        .unwrap();
    let err = resolver
        .add_local_definition(&LocalDefinition::new("widget0", DfnType::Dfn, "widget"))
        .unwrap_err();
    match err {
        RefError::DuplicateDefinition { message, first, second } => {
            assert!(message.contains("'widget'"));
            assert_eq!(first, "#widget");
            assert_eq!(second, "#widget0");
        }
        other => panic!("expected DuplicateDefinition, got {other:?}"),
    }

    resolver
        .add_local_definition(&LocalDefinition::new("widget-for-a", DfnType::Dfn, "widget").with_for("a"))
        .unwrap();
}

#[test]
fn test_status_selection_and_fallback() {
    let mut resolver = sealed(resolver_with(
        vec![
            ("both-1", spec(Some("https://ed/both/"), Some("https://tr/both/"))),
            ("tronly-1", spec(None, Some("https://tr/tronly/"))),
        ],
        vec![
            anchor("alpha", DfnType::Dfn, "both-1", Some("https://ed/both/#alpha"), Some("https://tr/both/#alpha")),
            anchor("beta", DfnType::Dfn, "tronly-1", None, Some("https://tr/tronly/#beta")),
            anchor("gamma", DfnType::Dfn, "both-1", None, Some("https://tr/both/#gamma")),
        ],
    ));

    let current = LinkRequest::new(DfnType::Dfn, "alpha").with_status(Status::Current);
    assert_eq!(resolver.get_ref(&current).unwrap().url, "https://ed/both/#alpha");
    let snapshot = LinkRequest::new(DfnType::Dfn, "alpha").with_status(Status::Snapshot);
    assert_eq!(resolver.get_ref(&snapshot).unwrap().url, "https://tr/both/#alpha");

    // Snapshot-only spec: falling back is allowed.
    let beta = LinkRequest::new(DfnType::Dfn, "beta").with_status(Status::Current);
    assert_eq!(resolver.get_ref(&beta).unwrap().url, "https://tr/tronly/#beta");

    // The spec has an ED, but this anchor doesn't: no cross-substitution.
    let gamma = LinkRequest::new(DfnType::Dfn, "gamma").with_status(Status::Current);
    assert_eq!(stage_of(resolver.get_ref(&gamma)), FailureStage::Status);

    let gamma_tr = LinkRequest::new(DfnType::Dfn, "gamma").with_status(Status::Snapshot);
    assert_eq!(resolver.get_ref(&gamma_tr).unwrap().url, "https://tr/both/#gamma");
}

#[test]
fn test_unknown_spec_counts_as_snapshot_only() {
    let mut resolver = sealed(resolver_with(
        vec![],
        vec![anchor("delta", DfnType::Dfn, "mystery", None, Some("https://tr/mystery/#delta"))],
    ));
    let req = LinkRequest::new(DfnType::Dfn, "delta").with_status(Status::Current);
    assert_eq!(resolver.get_ref(&req).unwrap().url, "https://tr/mystery/#delta");
}

#[test]
fn test_snapshot_falls_back_to_current() {
    let mut resolver = sealed(resolver_with(
        vec![("edonly", spec(Some("https://ed/edonly/"), None))],
        vec![anchor("eps", DfnType::Dfn, "edonly", Some("https://ed/edonly/#eps"), None)],
    ));
    let req = LinkRequest::new(DfnType::Dfn, "eps").with_status(Status::Snapshot);
    assert_eq!(resolver.get_ref(&req).unwrap().url, "https://ed/edonly/#eps");
}

#[test]
fn test_highest_level_wins() {
    let mut resolver = sealed(resolver_with(
        vec![
            ("foo-1", spec(Some("https://ed/foo-1/"), None)),
            ("foo-2", spec(Some("https://ed/foo-2/"), None)),
        ],
        vec![
            anchor("gizmo", DfnType::Property, "foo-1", Some("https://ed/foo-1/#gizmo"), None),
            anchor("gizmo", DfnType::Property, "foo-2", Some("https://ed/foo-2/#gizmo"), None),
        ],
    ));
    let resolved = resolver
        .get_ref(&LinkRequest::new(DfnType::Property, "gizmo"))
        .unwrap();
    assert_eq!(resolved.url, "https://ed/foo-2/#gizmo");
    assert_eq!(resolved.candidate.level(), SpecLevel::parse("2").as_ref());
    assert_eq!(resolver.messages().count(Level::Warning), 0);
}

#[test]
fn test_spelling_variants() {
    let mut resolver = resolver_with(vec![], vec![]);
    resolver
        .add_local_definition(&LocalDefinition::new("box", DfnType::Dfn, "box"))
        .unwrap();
    resolver.seal();
    let resolved = resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "boxes")).unwrap();
    assert_eq!(resolved.url, "#box");

    let mut resolver = resolver_with(vec![], vec![]);
    resolver
        .add_local_definition(&LocalDefinition::new("box", DfnType::Dfn, "box"))
        .unwrap();
    resolver
        .add_local_definition(&LocalDefinition::new("boxes", DfnType::Dfn, "boxes"))
        .unwrap();
    resolver.seal();
    let resolved = resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "boxes")).unwrap();
    assert_eq!(resolved.url, "#boxes");
}

#[test]
fn test_variants_only_apply_to_dfn_links() {
    let mut resolver = sealed(resolver_with(
        vec![],
        vec![anchor("box", DfnType::Value, "css-foo", Some("https://ed/foo/#box"), None)],
    ));
    let req = LinkRequest::new(DfnType::Value, "boxes");
    assert_eq!(stage_of(resolver.get_ref(&req)), FailureStage::Text);
}

#[test]
fn test_for_scope_filtering() {
    let mut flex = anchor("flex", DfnType::Value, "css-display-3", Some("https://ed/display/#flex"), None);
    flex.for_scope.insert("display".to_string());
    let mut resolver = sealed(resolver_with(
        vec![("css-display-3", spec(Some("https://ed/display/"), None))],
        vec![flex],
    ));

    let bare = LinkRequest::new(DfnType::Value, "flex");
    assert_eq!(stage_of(resolver.get_ref(&bare)), FailureStage::For);
    assert!(resolver.messages().diagnostics()[0]
        .text
        .contains("No 'value' refs found for 'flex' with for=''"));

    let scoped = LinkRequest::new(DfnType::Value, "flex").with_for("display");
    assert_eq!(resolver.get_ref(&scoped).unwrap().url, "https://ed/display/#flex");
}

#[test]
fn test_ambiguity_picks_first_and_warns() {
    let mut resolver = sealed(resolver_with(
        vec![
            ("spec-a", spec(Some("https://a/"), None)),
            ("spec-b", spec(Some("https://b/"), None)),
        ],
        vec![
            anchor("thing", DfnType::Dfn, "spec-a", Some("https://a/#thing"), None),
            anchor("thing", DfnType::Dfn, "spec-b", Some("https://b/#thing"), None),
        ],
    ));
    let resolved = resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "thing")).unwrap();
    assert_eq!(resolved.url, "https://a/#thing");
    assert!(!resolver.messages().should_abort());

    let warnings: Vec<_> = resolver
        .messages()
        .diagnostics()
        .iter()
        .filter(|d| d.level == Level::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].text.contains("spec:spec-a; type:dfn; text:thing"));
    assert!(warnings[0].text.contains("spec-b (dfn) thing"));
}

#[test]
fn test_silent_requests_emit_nothing() {
    let mut resolver = sealed(resolver_with(vec![], vec![]));
    assert!(resolver.get_ref(&LinkRequest::new(LinkType::Maybe, "nothing")).is_err());
    assert!(resolver
        .get_ref(&LinkRequest::new(DfnType::Dfn, "nothing").silent())
        .is_err());
    assert!(resolver.messages().diagnostics().is_empty());

    let req = LinkRequest::new(DfnType::Dfn, "nothing");
    assert!(resolver.get_ref(&req).is_err());
    assert!(resolver.get_ref(&req).is_err());
    assert_eq!(resolver.messages().count(Level::LinkError), 1);
    assert_eq!(
        resolver.messages().diagnostics()[0].text,
        "No 'dfn' refs found for 'nothing'."
    );
}

#[test]
fn test_custom_properties_fail_silently() {
    let mut resolver = sealed(resolver_with(vec![], vec![]));
    let req = LinkRequest::new(DfnType::Property, "--main-color");
    assert_eq!(stage_of(resolver.get_ref(&req)), FailureStage::Text);
    assert!(resolver.messages().diagnostics().is_empty());
}

#[test]
fn test_link_defaults_select_spec() {
    let metadata = DocumentMetadata {
        link_defaults: vec!["spec-b (value) auto".to_string()],
        ..DocumentMetadata::default()
    };
    let mut resolver = build(
        vec![],
        vec![
            anchor("auto", DfnType::Value, "spec-a", Some("https://a/#auto"), None),
            anchor("auto", DfnType::Value, "spec-b", Some("https://b/#auto"), None),
        ],
        &test_config(),
        &metadata,
        MemorySource::new(),
    );
    resolver.seal();
    let resolved = resolver.get_ref(&LinkRequest::new(DfnType::Value, "auto")).unwrap();
    assert_eq!(resolved.url, "https://b/#auto");
    assert_eq!(resolver.messages().count(Level::Warning), 0);
}

#[test]
fn test_link_default_narrows_shorthand_kind() {
    let metadata = DocumentMetadata {
        link_default_blocks: vec!["spec: spec-b; type: property; text: width".to_string()],
        ..DocumentMetadata::default()
    };
    let mut resolver = build(
        vec![],
        vec![
            anchor("width", DfnType::Descriptor, "spec-a", Some("https://a/#width"), None),
            anchor("width", DfnType::Property, "spec-b", Some("https://b/#width"), None),
        ],
        &test_config(),
        &metadata,
        MemorySource::new(),
    );
    resolver.seal();
    let resolved = resolver.get_ref(&LinkRequest::new(LinkType::Propdesc, "width")).unwrap();
    assert_eq!(resolved.url, "https://b/#width");
    assert_eq!(resolved.candidate.kind, DfnType::Property);
}

#[test]
fn test_malformed_link_defaults_are_fatal_messages() {
    let metadata = DocumentMetadata {
        link_defaults: vec!["this is not a default".to_string()],
        ..DocumentMetadata::default()
    };
    let resolver = build(vec![], vec![], &test_config(), &metadata, MemorySource::new());
    assert_eq!(resolver.messages().count(Level::Fatal), 1);
    assert!(resolver.messages().should_abort());
}

#[test]
fn test_propdesc_prefers_property_when_ambiguous() {
    let mut resolver = sealed(resolver_with(
        vec![],
        vec![
            anchor("color", DfnType::Descriptor, "spec-a", Some("https://a/#color"), None),
            anchor("color", DfnType::Property, "spec-b", Some("https://b/#color"), None),
        ],
    ));
    let resolved = resolver.get_ref(&LinkRequest::new(LinkType::Propdesc, "color")).unwrap();
    assert_eq!(resolved.url, "https://b/#color");
    assert_eq!(resolver.messages().count(Level::Warning), 1);
}

#[test]
fn test_unexported_anchors_need_an_explicit_spec() {
    let mut hidden = anchor("secret", DfnType::Dfn, "spec-a", Some("https://a/#secret"), None);
    hidden.exported = false;
    let mut resolver = sealed(resolver_with(vec![], vec![hidden]));

    let req = LinkRequest::new(DfnType::Dfn, "secret");
    assert_eq!(stage_of(resolver.get_ref(&req)), FailureStage::Export);

    let explicit = LinkRequest::new(DfnType::Dfn, "secret").with_spec("spec-a");
    assert_eq!(resolver.get_ref(&explicit).unwrap().url, "https://a/#secret");
}

#[test]
fn test_explicit_spec_mismatch() {
    let mut resolver = sealed(resolver_with(
        vec![],
        vec![anchor("node", DfnType::Interface, "dom", Some("https://dom/#node"), None)],
    ));
    let req = LinkRequest::new(DfnType::Interface, "Node").with_spec("html");
    assert_eq!(stage_of(resolver.get_ref(&req)), FailureStage::Spec);
    assert!(resolver.messages().diagnostics()[0].text.contains("with spec 'html'"));
}

#[test]
fn test_ignored_and_replaced_specs() {
    let config = RefsConfig {
        ignored_specs: vec!["spec-a".to_string()],
        ..test_config()
    };
    let mut resolver = build(
        vec![],
        vec![
            anchor("lonely", DfnType::Dfn, "spec-a", Some("https://a/#lonely"), None),
            anchor("block", DfnType::Value, "css21", Some("https://css21/#block"), None),
            anchor("block", DfnType::Value, "css-display-3", Some("https://display/#block"), None),
        ],
        &config,
        &DocumentMetadata::default(),
        MemorySource::new(),
    );
    resolver.seal();

    let lonely = LinkRequest::new(DfnType::Dfn, "lonely");
    assert_eq!(stage_of(resolver.get_ref(&lonely)), FailureStage::IgnoredSpecs);

    let block = resolver.get_ref(&LinkRequest::new(DfnType::Value, "block")).unwrap();
    assert_eq!(block.url, "https://display/#block");
    assert_eq!(resolver.messages().count(Level::Warning), 0);

    let legacy = LinkRequest::new(DfnType::Value, "block").with_spec("css21");
    assert_eq!(resolver.get_ref(&legacy).unwrap().url, "https://css21/#block");
}

#[test]
fn test_ignored_specs_block_replaces() {
    let metadata = DocumentMetadata {
        ignored_spec_blocks: vec!["spec: old-spec; replacedBy: new-spec".to_string()],
        ..DocumentMetadata::default()
    };
    let mut resolver = build(
        vec![],
        vec![
            anchor("term", DfnType::Dfn, "old-spec", Some("https://old/#term"), None),
            anchor("term", DfnType::Dfn, "new-spec", Some("https://new/#term"), None),
        ],
        &test_config(),
        &metadata,
        MemorySource::new(),
    );
    resolver.seal();
    let resolved = resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "term")).unwrap();
    assert_eq!(resolved.url, "https://new/#term");
}

#[test]
fn test_own_published_spec_is_not_linked() {
    let metadata = DocumentMetadata {
        shortname: "css-foo".to_string(),
        ..DocumentMetadata::default()
    };
    let mut resolver = build(
        vec![],
        vec![anchor("removed", DfnType::Dfn, "css-foo-1", Some("https://ed/foo/#removed"), None)],
        &test_config(),
        &metadata,
        MemorySource::new(),
    );
    resolver.seal();
    let req = LinkRequest::new(DfnType::Dfn, "removed");
    assert!(matches!(resolver.get_ref(&req), Err(RefError::NotFound { .. })));
}

#[test]
fn test_multiple_local_candidates_pick_first() {
    let mut resolver = resolver_with(vec![], vec![]);
    resolver
        .add_local_definition(
            &LocalDefinition::new("x-ab", DfnType::Dfn, "x").with_for("a").with_for("b"),
        )
        .unwrap();
    resolver
        .add_local_definition(&LocalDefinition::new("x-a", DfnType::Dfn, "x").with_for("a"))
        .unwrap();
    resolver.seal();

    let resolved = resolver
        .get_ref(&LinkRequest::new(DfnType::Dfn, "x").with_for("a"))
        .unwrap();
    assert_eq!(resolved.url, "#x-ab");
    assert_eq!(resolver.messages().count(Level::Warning), 1);

    let narrow = resolver
        .get_ref(&LinkRequest::new(DfnType::Dfn, "x").with_for("b"))
        .unwrap();
    assert_eq!(narrow.url, "#x-ab");
}

#[test]
fn test_usages_are_recorded() {
    let mut informative = anchor("hint", DfnType::Dfn, "spec-b", Some("https://b/#hint"), None);
    informative.normative = false;
    let mut resolver = sealed(resolver_with(
        vec![],
        vec![
            anchor("term", DfnType::Dfn, "spec-a", Some("https://a/#term"), None),
            informative,
        ],
    ));
    resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "term")).unwrap();
    resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "hint")).unwrap();
    assert_eq!(
        resolver.usages().specs(),
        &[("spec-a".to_string(), true), ("spec-b".to_string(), false)]
    );

    let entry = resolver
        .get_biblio_ref(&BiblioRequest::new("RFC2119").normative())
        .unwrap()
        .unwrap();
    assert_eq!(entry.key, "rfc2119");
    let normative: Vec<_> = resolver
        .usages()
        .normative_biblio()
        .iter()
        .map(|e| e.key.clone())
        .collect();
    assert_eq!(normative, vec!["spec-a", "rfc2119"]);
    assert_eq!(resolver.usages().informative_biblio()[0].key, "spec-b");
}

#[test]
fn test_autolinks_record_bibliography_entries() {
    let source = MemorySource::new().with_file(
        "biblio/biblio-do.data",
        "%L dom\n%T DOM Standard\n%U https://dom.spec.whatwg.org/\n",
    );
    let html = SpecData {
        title: Some("HTML Standard".to_string()),
        ..spec(Some("https://html/"), None)
    };
    let mut resolver = sealed(build(
        vec![("html", html)],
        vec![
            anchor("node", DfnType::Interface, "dom", Some("https://dom/#node"), None),
            anchor("window", DfnType::Interface, "html", Some("https://html/#window"), None),
        ],
        &test_config(),
        &DocumentMetadata::default(),
        source,
    ));

    let node = resolver.get_ref(&LinkRequest::new(DfnType::Interface, "node")).unwrap();
    assert_eq!(node.url, "https://dom/#node");
    resolver
        .get_ref(&LinkRequest::new(DfnType::Interface, "window").informative())
        .unwrap();

    let normative = resolver.usages().normative_biblio();
    assert_eq!(normative.len(), 1);
    assert_eq!(normative[0].title, "DOM Standard");
    assert!(!normative[0].generated);

    // No bibliography data for html: the entry comes from the specs table.
    let informative = resolver.usages().informative_biblio();
    assert_eq!(informative.len(), 1);
    assert_eq!(informative[0].key, "html");
    assert_eq!(informative[0].title, "HTML Standard");
    assert!(informative[0].generated);

    assert_eq!(
        resolver.usages().specs(),
        &[("dom".to_string(), true), ("html".to_string(), false)]
    );
    assert!(resolver.messages().diagnostics().is_empty());
}

#[test]
fn test_normative_link_upgrades_informative_usage() {
    let mut resolver = sealed(resolver_with(
        vec![],
        vec![anchor("term", DfnType::Dfn, "spec-a", Some("https://a/#term"), None)],
    ));
    resolver
        .get_ref(&LinkRequest::new(DfnType::Dfn, "term").informative())
        .unwrap();
    assert_eq!(resolver.usages().specs(), &[("spec-a".to_string(), false)]);
    assert_eq!(resolver.usages().informative_biblio()[0].key, "spec-a");

    resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "term")).unwrap();
    assert_eq!(resolver.usages().specs(), &[("spec-a".to_string(), true)]);
    assert!(resolver.usages().informative_biblio().is_empty());
    assert_eq!(resolver.usages().normative_biblio()[0].key, "spec-a");
}

#[test]
fn test_section_refs() {
    let source = MemorySource::new().with_file(
        "headings/headings-css-foo-1.json",
        r##"{
            "#intro": {
                "current": {"number": "1", "spec": "CSS Foo 1", "text": "Introduction", "url": "https://ed/foo/#intro"},
                "snapshot": {"number": "1", "spec": "CSS Foo 1", "text": "Introduction", "url": "https://tr/foo/#intro"}
            }
        }"##,
    );
    let mut resolver = build(vec![], vec![], &test_config(), &DocumentMetadata::default(), source);

    let heading = resolver.get_section_ref("css-foo-1", "intro", None).unwrap();
    assert_eq!(heading.url, "https://ed/foo/#intro");
    let heading = resolver
        .get_section_ref("css-foo-1", "#intro", Some(Status::Snapshot))
        .unwrap();
    assert_eq!(heading.url, "https://tr/foo/#intro");

    assert!(matches!(
        resolver.get_section_ref("css-foo-1", "missing", None),
        Err(RefError::UnknownSection { .. })
    ));
    assert!(matches!(
        resolver.get_section_ref("no-such-spec", "intro", None),
        Err(RefError::UnknownSection { .. })
    ));
}

#[test]
fn test_document_status_sets_default_ref_status() {
    let metadata = DocumentMetadata {
        status: "WD".to_string(),
        ..DocumentMetadata::default()
    };
    let mut resolver = build(
        vec![("both-1", spec(Some("https://ed/both/"), Some("https://tr/both/")))],
        vec![anchor(
            "alpha",
            DfnType::Dfn,
            "both-1",
            Some("https://ed/both/#alpha"),
            Some("https://tr/both/#alpha"),
        )],
        &test_config(),
        &metadata,
        MemorySource::new(),
    );
    resolver.seal();
    assert_eq!(resolver.default_status(), Status::Snapshot);
    let resolved = resolver.get_ref(&LinkRequest::new(DfnType::Dfn, "alpha")).unwrap();
    assert_eq!(resolved.url, "https://tr/both/#alpha");
}
