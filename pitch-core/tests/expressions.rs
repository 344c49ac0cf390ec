use pitch_core::expressions::{parse_scalar, Environment, ExpressionError, Namespace, Renderer};
use serde_json::{json, Value};
use std::sync::Arc;

fn ns(value: Value) -> Namespace {
    value.as_object().cloned().unwrap_or_default()
}

fn render(source: &str, namespace: Value) -> Result<Value, ExpressionError> {
    Renderer::default().render_str(source, &ns(namespace))
}

#[test]
fn arithmetic_and_comparisons() {
    assert_eq!(render("{{ 1 + 2 * 3 }}", json!({})).unwrap(), json!(7));
    assert_eq!(render("{{ (1 + 2) * 3 }}", json!({})).unwrap(), json!(9));
    assert_eq!(render("{{ 7 // 2 }}", json!({})).unwrap(), json!(3));
    assert_eq!(render("{{ 2 ** 3 }}", json!({})).unwrap(), json!(8));
    assert_eq!(render("{{ -n }}", json!({"n": 4})).unwrap(), json!(-4));
    assert_eq!(render("{{ 1 < n <= 4 }}", json!({"n": 4})).unwrap(), json!(true));
    assert_eq!(render("{{ n > 10 }}", json!({"n": 4})).unwrap(), json!(false));
}

#[test]
fn boolean_logic_short_circuits() {
    assert_eq!(render("{{ false and missing }}", json!({})).unwrap(), json!(false));
    assert_eq!(render("{{ true or missing }}", json!({})).unwrap(), json!(true));
    assert_eq!(render("{{ not items }}", json!({"items": []})).unwrap(), json!(true));
    assert!(render("{{ true and missing }}", json!({})).is_err());
}

#[test]
fn attribute_and_index_access() {
    let data = json!({"response": {"as_json": {"users": [{"id": 1}, {"id": 2}]}}});
    assert_eq!(render("{{ response.as_json.users[1].id }}", data.clone()).unwrap(), json!(2));
    assert_eq!(render("{{ response.as_json.users.0.id }}", data.clone()).unwrap(), json!(1));
    assert_eq!(render("{{ response.as_json['users'][-1]['id'] }}", data.clone()).unwrap(), json!(2));
    assert_eq!(
        render("{{ response.as_json.token }}", data).unwrap_err(),
        ExpressionError::Unresolved("response.as_json.token".into())
    );
}

#[test]
fn string_operations() {
    assert_eq!(render("{{ 'a' ~ 1 ~ true }}", json!({})).unwrap(), json!("a1true"));
    assert_eq!(render("{{ 'ell' in 'hello' }}", json!({})).unwrap(), json!(true));
    assert_eq!(render("{{ name | upper }}", json!({"name": "bob"})).unwrap(), json!("BOB"));
    assert_eq!(render("{{ 'x' if flag else 'y' }}", json!({"flag": false})).unwrap(), json!("y"));
}

#[test]
fn default_filter_and_definedness_tests() {
    assert_eq!(render("{{ missing | default('d') }}", json!({})).unwrap(), json!("d"));
    assert_eq!(render("{{ missing.deep | d(3) }}", json!({})).unwrap(), json!(3));
    assert_eq!(render("{{ '' | default('d', true) }}", json!({})).unwrap(), json!("d"));
    assert_eq!(render("{{ x | default('d') }}", json!({"x": 0})).unwrap(), json!(0));
    assert_eq!(render("{{ missing is defined }}", json!({})).unwrap(), json!(false));
    assert_eq!(render("{{ x is not undefined }}", json!({"x": 1})).unwrap(), json!(true));
}

#[test]
fn json_filters_and_tests() {
    assert_eq!(
        render("{{ data | to_json }}", json!({"data": {"a": [1, 2]}})).unwrap(),
        json!(r#"{"a":[1,2]}"#)
    );
    assert_eq!(
        render("{{ text | from_json }}", json!({"text": "{\"k\": true}"})).unwrap(),
        json!({"k": true})
    );
    assert!(render("{{ 'nope' | from_json }}", json!({})).is_err());
    assert_eq!(render("{{ data is json_serializable }}", json!({"data": [1]})).unwrap(), json!(true));
    assert_eq!(render("{{ 4 is even and 3 is odd }}", json!({})).unwrap(), json!(true));
}

#[test]
fn from_environment_filter() {
    std::env::set_var("PITCH_EXPRESSIONS_TEST_TOKEN", "s3cret");
    assert_eq!(
        render("{{ 'PITCH_EXPRESSIONS_TEST_TOKEN' | from_environment }}", json!({})).unwrap(),
        json!("s3cret")
    );
    assert_eq!(
        render("{{ 'PITCH_EXPRESSIONS_TEST_UNSET' | from_environment('none') }}", json!({})).unwrap(),
        json!("none")
    );
}

#[test]
fn collection_filters() {
    let data = json!({"items": ["a", "b", "c"]});
    assert_eq!(render("{{ items | length }}", data.clone()).unwrap(), json!(3));
    assert_eq!(render("{{ items | join('-') }}", data.clone()).unwrap(), json!("a-b-c"));
    assert_eq!(render("{{ items | first }}{{ items | last }}", data).unwrap(), json!("ac"));
    assert_eq!(render("{{ '42' | int + 1 }}", json!({})).unwrap(), json!(43));
    assert_eq!(render("{{ 2.567 | round(2) }}", json!({})).unwrap(), json!(2.57));
}

#[test]
fn registered_filters_and_tests_extend_the_environment() {
    let mut env = Environment::default();
    env.register_filter("shout", |value, _| {
        Ok(json!(format!("{}!", value.as_str().unwrap_or_default())))
    });
    env.register_test("admin", |value, _| Ok(value == &json!("root")));
    let renderer = Renderer::new(Arc::new(env));
    let namespace = ns(json!({"who": "root"}));
    assert_eq!(renderer.render_str("{{ who | shout }}", &namespace).unwrap(), json!("root!"));
    assert_eq!(renderer.render_str("{{ who is admin }}", &namespace).unwrap(), json!(true));
    assert_eq!(
        Renderer::default().render_str("{{ who | shout }}", &namespace).unwrap_err(),
        ExpressionError::UnknownFilter("shout".into())
    );
}

#[test]
fn literal_structures() {
    assert_eq!(
        render("{{ {'a': [1, 2], 'b': none} }}", json!({})).unwrap(),
        json!({"a": [1, 2], "b": null})
    );
}

#[test]
fn rendered_text_parses_as_yaml_scalar() {
    let rendered = render("{{ 'yes' }}", json!({})).unwrap();
    assert_eq!(parse_scalar(rendered.as_str().unwrap()), Some(json!(true)));
}
