//! Form engine contract tests: edit purity, array defaults and rendering of
//! nested arrays of objects.

use protodesk_schema::{
    append_item, edit, remove_item, render, DataValue, DisplayStyle, FieldPath, Mode, NodeKind,
    SchemaNode, Widget,
};
use serde_json::json;

fn api_schema() -> SchemaNode {
    SchemaNode::from_document_str(
        r#"{
            "type": "object",
            "properties": {
                "_id": {"type": "string"},
                "name": {"type": "string"},
                "apis": {
                    "type": "array",
                    "display_mapping": {"style": "badge"},
                    "items": {
                        "type": "object",
                        "display_mapping": {
                            "title": "{method}:{path}",
                            "description": "summary",
                            "type": "method"
                        },
                        "properties": {
                            "_id": {"type": "string"},
                            "method": {"type": "string", "enum": ["GET", "POST"]},
                            "path": {"type": "string"},
                            "summary": {"type": "string"},
                            "parameters": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {"name": {"type": "string"}}
                                }
                            }
                        }
                    }
                }
            }
        }"#,
    )
}

fn sample() -> DataValue {
    DataValue::from(json!({
        "_id": "doc-1",
        "name": "Vehicle API",
        "apis": [
            {"method": "GET", "path": "/speed", "summary": "Current speed",
             "parameters": [{"name": "unit"}]},
            {"method": "POST", "path": "/doors", "summary": "Lock doors",
             "parameters": [{"name": "side"}, {"name": "force"}, {"name": "delay"}]}
        ]
    }))
}

fn path(s: &str) -> FieldPath {
    FieldPath::parse(s).unwrap()
}

#[test]
fn edit_is_pure_and_shares_siblings() {
    let data = sample();
    let target = path("apis.1.parameters.2.name");
    let updated = edit(&data, &target, DataValue::string("timeout"));

    assert!(!updated.same_ref(&data));
    assert_eq!(target.lookup(&updated), Some(&DataValue::string("timeout")));
    assert_eq!(target.lookup(&data), Some(&DataValue::string("delay")));

    // every ancestor on the chain is fresh
    for ancestor in ["apis", "apis.1", "apis.1.parameters", "apis.1.parameters.2"] {
        let p = path(ancestor);
        assert!(
            !p.lookup(&updated).unwrap().same_ref(p.lookup(&data).unwrap()),
            "{ancestor} should have been copied"
        );
    }

    // everything beside the chain is shared
    for sibling in [
        "_id",
        "name",
        "apis.0",
        "apis.1.method",
        "apis.1.parameters.0",
        "apis.1.parameters.1",
    ] {
        let p = path(sibling);
        assert!(
            p.lookup(&updated).unwrap().same_ref(p.lookup(&data).unwrap()),
            "{sibling} should be shared"
        );
    }
}

#[test]
fn append_default_per_kind_and_remove_restores() {
    let cases = [
        (NodeKind::String { enum_values: None }, json!("")),
        (NodeKind::Number, json!(0)),
        (NodeKind::Integer, json!(0)),
        (NodeKind::Boolean, json!(false)),
        (
            NodeKind::Array {
                items: Box::new(SchemaNode::unknown()),
            },
            json!([]),
        ),
        (SchemaNode::empty().kind, json!({})),
    ];

    let data = DataValue::from(json!({"list": ["keep-0", "keep-1"]}));
    let list = path("list");

    for (kind, expected) in cases {
        let schema = SchemaNode::with_kind(kind);
        let appended = append_item(&data, &list, &schema);
        let items = list.lookup(&appended).unwrap().as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].to_json(), expected);

        let removed = remove_item(&appended, &list, 2);
        let restored = list.lookup(&removed).unwrap().as_array().unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(removed, data);
        for (i, original) in data.get("list").unwrap().as_array().unwrap().iter().enumerate() {
            assert!(restored[i].same_ref(original));
        }
    }
}

#[test]
fn object_list_renders_elements_with_summaries() {
    let fields = render(&api_schema(), &sample(), Mode::Edit, &["_id"], &FieldPath::root());
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "apis"]);

    let Widget::ObjectList { style, elements } = &fields[1].widget else {
        panic!("apis should render as an object list");
    };
    assert_eq!(*style, DisplayStyle::Badge);
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[1].summary.title, "POST:/doors");
    assert_eq!(elements[1].summary.description, "Lock doors");
    assert_eq!(elements[1].summary.type_label, "POST");

    // excluded fields are skipped inside elements too
    let element_names: Vec<&str> = elements[1].fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(element_names, vec!["method", "path", "summary", "parameters"]);

    let Widget::ObjectList { elements: params, .. } = &elements[1].fields[3].widget else {
        panic!("parameters should render as an object list");
    };
    assert_eq!(params.len(), 3);
    assert_eq!(params[2].fields[0].path.to_string(), "apis.1.parameters.2.name");
    assert_eq!(params[2].fields[0].depth, 2);
    assert_eq!(params[2].summary.title, "");
}

#[test]
fn removing_an_element_renumbers_rendered_paths() {
    let data = remove_item(&sample(), &path("apis"), 0);
    let fields = render(&api_schema(), &data, Mode::Edit, &[], &FieldPath::root());
    let apis = fields.iter().find(|f| f.name == "apis").unwrap();
    let Widget::ObjectList { elements, .. } = &apis.widget else {
        panic!("apis should render as an object list");
    };
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].path.to_string(), "apis.0");
    assert_eq!(elements[0].summary.title, "POST:/doors");
}

#[test]
fn invalid_schema_text_renders_nothing() {
    let schema = SchemaNode::from_document_str("not a schema");
    let fields = render(&schema, &sample(), Mode::View, &[], &FieldPath::root());
    assert!(fields.is_empty());
}

#[test]
fn edit_creating_containers_copies_chain_and_shares_the_rest() {
    let data = sample();
    let target = path("apis.0.meta.owner.team");
    let updated = edit(&data, &target, DataValue::string("platform"));

    assert_eq!(target.lookup(&updated), Some(&DataValue::string("platform")));
    assert_eq!(path("apis.0.meta").lookup(&data), None);
    for ancestor in ["apis", "apis.0"] {
        let p = path(ancestor);
        assert!(
            !p.lookup(&updated).unwrap().same_ref(p.lookup(&data).unwrap()),
            "{ancestor} should have been copied"
        );
    }
    for sibling in ["_id", "name", "apis.1", "apis.0.parameters", "apis.0.summary"] {
        let p = path(sibling);
        assert!(
            p.lookup(&updated).unwrap().same_ref(p.lookup(&data).unwrap()),
            "{sibling} should be shared"
        );
    }
}

#[test]
fn edit_padding_an_array_shares_existing_elements() {
    let data = sample();
    let updated = edit(&data, &path("apis.3.method"), DataValue::string("PUT"));

    let apis = path("apis").lookup(&updated).unwrap().as_array().unwrap();
    assert_eq!(apis.len(), 4);
    assert_eq!(apis[2], DataValue::Null);
    assert!(apis[0].same_ref(path("apis.0").lookup(&data).unwrap()));
    assert!(apis[1].same_ref(path("apis.1").lookup(&data).unwrap()));
    assert!(path("name").lookup(&updated).unwrap().same_ref(path("name").lookup(&data).unwrap()));
}

#[test]
fn edit_with_unreachable_index_returns_input() {
    let data = sample();
    for raw in [
        "apis.18446744073709551615",
        "apis.4000000000.method",
        "apis.1.parameters.99999.name",
    ] {
        let updated = edit(&data, &path(raw), DataValue::string("x"));
        assert!(updated.same_ref(&data), "{raw} should leave the document as is");
    }
}
