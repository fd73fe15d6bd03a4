use fieldmask::{parse_paths, path_to_string, FieldsExpression, ParseError, Tree, TreeBuilder};
use yare::parameterized;

fn nested() -> Tree {
    let mut builder = TreeBuilder::of_branch(["items", "author", "uri"]);
    let root = builder.root();
    builder.branch(root, ["items", "title"]);
    builder.build()
}

fn deep_nested() -> Tree {
    let mut builder = TreeBuilder::of_branch(["items", "author", "uri", "a"]);
    let root = builder.root();
    builder.branch(root, ["items", "author", "uri", "b"]);
    builder.branch(root, ["items", "title"]);
    builder.build()
}

#[parameterized(
    single_field = { "items", TreeBuilder::of_branch(["items"]).build() },
    two_fields = { "etag,items", TreeBuilder::with_children(["etag", "items"]).build() },
    sub_selection = { "context/facets/label", TreeBuilder::of_branch(["context", "facets", "label"]).build() },
    terminal_wildcard = { "items/pagemap/*", TreeBuilder::of_branch(["items", "pagemap"]).build() },
    middle_wildcard = { "items/pagemap/*/title", TreeBuilder::of_branch(["items", "pagemap", "*", "title"]).build() },
    group = { "items(id)", TreeBuilder::of_branch(["items", "id"]).build() },
    slash = { "items/id", TreeBuilder::of_branch(["items", "id"]).build() },
    group_with_paths = { "items(author/uri,title)", nested() },
    expanded_paths = { "items/author/uri,items/title", nested() },
    nested_groups = { "items(title,author/uri(a,b))", deep_nested() },
    expanded_nested = { "items/title,items/author/uri/a,items/author/uri/b", deep_nested() },
    redundant_path = { "items/id,items", TreeBuilder::of_branch(["items"]).build() },
    redundant_group = { "items(id),items", TreeBuilder::of_branch(["items"]).build() },
    duplicates = { "a,a", TreeBuilder::of_branch(["a"]).build() },
    unicode_name = { "données/clé", TreeBuilder::of_branch(["données", "clé"]).build() },
    punctuation_in_names = { "kind.v1,@type,a-b_c", TreeBuilder::with_children(["kind.v1", "@type", "a-b_c"]).build() },
)]
fn test_parse_expression_ok(input: &str, expected: Tree) {
    let expression = FieldsExpression::parse(input).expect("Failed to parse input");

    assert_eq!(expression.filter_tree(), &expected);
}

#[parameterized(
    empty = { "" },
    space = { " " },
    tab = { "\t" },
    newline = { "\n" },
    blanks = { " \t\n" },
    lone_slash = { "/" },
    leading_slash = { "/a" },
    trailing_slash = { "a/" },
    double_slash = { "a//b" },
    lone_comma = { "," },
    leading_comma = { ",a" },
    trailing_comma = { "a," },
    double_comma = { "a,,b" },
    open_parenthesis = { "(" },
    close_parenthesis = { ")" },
    empty_group = { "()" },
    unclosed_group = { "a(" },
    group_without_prefix = { "(a" },
    close_before_name = { ")a" },
    unclosed_group_with_name = { "a(b" },
    two_open = { "((" },
    two_close = { "))" },
    reversed = { ")(" },
    trailing_close = { "a)" },
    stray_close = { "a)b" },
    unbalanced_suffix = { "items/title,items/author/uri/a))" },
    catch_all = { "**" },
    nested_catch_all = { "a/**" },
    space_in_name = { "a b" },
    padded = { " a" },
)]
fn test_parse_expression_err(input: &str) {
    let err: ParseError = FieldsExpression::parse(input).expect_err("Parsing should fail");

    assert_eq!(err.expression, input);
    assert!(err.to_string().contains(input), "{}", err);
}

#[parameterized(
    plain = { "a/b", "a/b/*" },
    many_wildcards = { "a/b", "a/b/*/*" },
    collapsed = { "items", "items/id,items" },
    group_order = { "a/b,a/c", "a(c,b)" },
)]
fn test_equivalent_expressions(left: &str, right: &str) {
    let left = FieldsExpression::parse(left).unwrap();
    let right = FieldsExpression::parse(right).unwrap();

    assert_eq!(left.filter_tree(), right.filter_tree());
    assert!(left.filter_tree().contains(right.filter_tree()));
    assert!(right.filter_tree().contains(left.filter_tree()));
}

#[parameterized(
    simple = { "a,b/c" },
    groups = { "items(id,author(name,uri)),etag" },
    wildcards = { "*/a,b/*/c" },
    redundant = { "x/y,x,x/z/w,q" },
)]
fn test_collapsed_text_reparses_to_same_tree(input: &str) {
    let expression = FieldsExpression::parse(input).unwrap();
    let reparsed = FieldsExpression::parse(&expression.collapsed_text()).unwrap();

    assert_eq!(reparsed.filter_tree(), expression.filter_tree());
    assert_eq!(reparsed.field_paths(), expression.field_paths());
    assert!(expression.filter_tree().contains(expression.filter_tree()));
}

#[test]
fn test_paths_keep_order_and_duplicates() {
    let paths: Vec<String> = parse_paths("b,a(y,x),b")
        .unwrap()
        .iter()
        .map(|path| path_to_string(path))
        .collect();

    assert_eq!(paths, vec!["b", "a/y", "a/x", "b"]);
}

#[test]
fn test_display_and_from_str() {
    let expression: FieldsExpression = "items(id),etag".parse().unwrap();

    assert_eq!(expression.to_string(), "items(id),etag");
    assert_eq!(expression.as_str(), "items(id),etag");
    assert_eq!(expression.all_paths().len(), 2);
}
