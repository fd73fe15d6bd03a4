use fieldmask::{
    copy_filtered, filter_reader, filter_str, filter_value, FieldsExpression, FilterError,
    FilteringSink, JsonSource, JsonText, JsonWriter, Segment, Tree, TreeBuilder,
};
use serde_json::json;
use yare::parameterized;

const TEST_INPUT: &str = r#"{"id":1,"text":"string","boolean":true,"float":1.3,"nullable":null,"array":[1,2,3],"object":{"A":"a","B":"b"},"nestedObjects":{"object1":{"A":"a","B":"b"},"object2":{"A":"a","B":"b"}},"arrayOfObjects":[{"A":"a","B":"b"}],"arrayOfArrays":[[1,2],[3,4],[5,6]]}"#;

fn branches(branches: &[&[&str]]) -> Tree {
    let mut builder = TreeBuilder::new();
    let root = builder.root();
    for branch in branches {
        builder.branch(root, branch.iter().copied());
    }
    builder.build()
}

fn catch_all_object() -> Tree {
    let mut builder = TreeBuilder::of_branch(["*", "A"]);
    let root = builder.root();
    let object = builder.child(root, Segment::from("object"));
    builder.set_catch_all(object);
    builder.build()
}

#[parameterized(
    root_wildcard = { branches(&[&["*"]]), TEST_INPUT },
    no_output = { branches(&[&["doesnotexist"]]), "{}" },
    simple = { branches(&[&["text"]]), r#"{"text":"string"}"# },
    prefix = { branches(&[&["object"]]), r#"{"object":{"A":"a","B":"b"}}"# },
    wildcard = { branches(&[&["object", "*"]]), r#"{"object":{"A":"a","B":"b"}}"# },
    wildcard_with_nested = { branches(&[&["nestedObjects", "*"]]), r#"{"nestedObjects":{"object1":{"A":"a","B":"b"},"object2":{"A":"a","B":"b"}}}"# },
    middle_wildcard = { branches(&[&["nestedObjects", "*", "B"]]), r#"{"nestedObjects":{"object1":{"B":"b"},"object2":{"B":"b"}}}"# },
    array_of_objects = { branches(&[&["arrayOfObjects", "B"]]), r#"{"arrayOfObjects":[{"B":"b"}]}"# },
    array_of_scalars = { branches(&[&["array"]]), r#"{"array":[1,2,3]}"# },
    filter_merging = { branches(&[&["object", "A"], &["object"]]), r#"{"object":{"A":"a"}}"# },
    wildcard_precedence = { branches(&[&["object", "A"], &["object", "*"]]), r#"{"object":{"A":"a","B":"b"}}"# },
    leading_wildcard = { branches(&[&["*", "object2", "B"]]), r#"{"id":1,"text":"string","boolean":true,"float":1.3,"nullable":null,"array":[1,2,3],"nestedObjects":{"object2":{"B":"b"}},"arrayOfArrays":[[1,2],[3,4],[5,6]]}"# },
    catch_all_wins = { catch_all_object(), r#"{"id":1,"text":"string","boolean":true,"float":1.3,"nullable":null,"array":[1,2,3],"object":{"A":"a","B":"b"},"arrayOfObjects":[{"A":"a"}],"arrayOfArrays":[[1,2],[3,4],[5,6]]}"# },
    second_level_no_match = { branches(&[&["object", "C"]]), "{}" },
    longer_filter = { branches(&[&["object", "A", "something"]]), "{}" },
    longer_filter_with_nested = { branches(&[&["nestedObjects", "object1", "something"]]), "{}" },
    several_fields_in_input_order = { branches(&[&["float"], &["id"], &["object", "B"]]), r#"{"id":1,"float":1.3,"object":{"B":"b"}}"# },
)]
fn test_filter_test_input(tree: Tree, expected: &str) {
    let filtered = filter_str(TEST_INPUT, &tree).expect("Failed to filter input");

    assert_eq!(filtered, expected);
}

#[parameterized(
    array_kept = { r#"[{"a":"1"}]"#, "a", r#"[{"a":"1"}]"# },
    array_emptied = { r#"[{"a":"1"}]"#, "b", "[]" },
    object_emptied = { r#"{"a":"1"}"#, "b", "{}" },
    empty_object_kept = { r#"{"a":{},"b":1}"#, "a", r#"{"a":{}}"# },
    empty_array_kept = { r#"{"a":[],"b":1}"#, "a", r#"{"a":[]}"# },
    empty_object_selected_through = { r#"{"a":{},"b":1}"#, "a/x", "{}" },
    group = { r#"{"items":[{"id":1,"title":"t"},{"id":2}],"etag":"e"}"#, "items(id)", r#"{"items":[{"id":1},{"id":2}]}"# },
    nested_arrays = { r#"{"a":[[{"b":1,"c":2}],[{"c":3}]]}"#, "a/b", r#"{"a":[[{"b":1}]]}"# },
    escaped_names = { r#"{"a\"b":{"c\\d":1,"e":2}}"#, "a\"b/c\\d", r#"{"a\"b":{"c\\d":1}}"# },
    root_scalar = { "42", "a", "42" },
    big_integer = { r#"{"id":123456789012345678901234567890,"x":1}"#, "id", r#"{"id":123456789012345678901234567890}"# },
    long_decimal = { r#"{"price":0.1000000000000000055511151231257827,"x":1}"#, "price", r#"{"price":0.1000000000000000055511151231257827}"# },
    numbers_in_kept_container = { r#"{"a":[-98765432109876543210,1.50000000000000000001],"b":2}"#, "a", r#"{"a":[-98765432109876543210,1.50000000000000000001]}"# },
)]
fn test_filter_small_documents(input: &str, fields: &str, expected: &str) {
    let expression = FieldsExpression::parse(fields).unwrap();

    let filtered = filter_str(input, expression.filter_tree()).unwrap();

    assert_eq!(filtered, expected);
}

#[test]
fn test_filter_value() {
    let expression = FieldsExpression::parse("kind,items/snippet(title,channelId)").unwrap();
    let response = json!({
        "kind": "youtube#searchListResponse",
        "etag": "abc",
        "items": [
            {"id": {"videoId": "v"}, "snippet": {"title": "T", "channelId": "C", "description": "D"}},
            {"id": {"videoId": "w"}}
        ]
    });

    let filtered = filter_value(&response, expression.filter_tree()).unwrap();

    assert_eq!(
        filtered,
        json!({
            "kind": "youtube#searchListResponse",
            "items": [{"snippet": {"title": "T", "channelId": "C"}}]
        })
    );
}

#[test]
fn test_filter_value_without_match() {
    let expression = FieldsExpression::parse("missing").unwrap();

    assert_eq!(filter_value(&json!({"a": 1}), expression.filter_tree()).unwrap(), json!({}));
    assert_eq!(filter_value(&json!([{"a": 1}]), expression.filter_tree()).unwrap(), json!([]));
}

#[test]
fn test_match_count() {
    let expression = FieldsExpression::parse("object,nestedObjects/*/A").unwrap();
    let mut filter = FilteringSink::new(JsonWriter::new(Vec::new()), expression.filter_tree());

    JsonText::new(TEST_INPUT.as_bytes())
        .emit_into(&mut filter)
        .unwrap();

    // the whole "object" counts once, then one "A" per nested object
    assert_eq!(filter.match_count(), 3);
}

#[test]
fn test_pretty_output() {
    let expression = FieldsExpression::parse("object/A").unwrap();

    let writer = copy_filtered(
        JsonText::new(TEST_INPUT.as_bytes()),
        JsonWriter::pretty(Vec::new()),
        expression.filter_tree(),
    )
    .unwrap();

    assert_eq!(
        String::from_utf8(writer.into_inner()).unwrap(),
        "{\n  \"object\": {\n    \"A\": \"a\"\n  }\n}"
    );
}

#[test]
fn test_filter_reader_streams_into_writer() {
    let expression = FieldsExpression::parse("id").unwrap();

    let output = filter_reader(TEST_INPUT.as_bytes(), Vec::new(), expression.filter_tree()).unwrap();

    assert_eq!(output, br#"{"id":1}"#);
}

#[parameterized(
    truncated = { r#"{"id":1"# },
    trailing_data = { r#"{"id":1} {"id":2}"# },
    not_json = { "id=1" },
    empty = { "" },
)]
fn test_invalid_json_is_an_error(input: &str) {
    let tree = branches(&[&["id"]]);

    let err = filter_str(input, &tree).expect_err("Filtering should fail");

    assert!(matches!(err, FilterError::Json(_)), "{:?}", err);
}
