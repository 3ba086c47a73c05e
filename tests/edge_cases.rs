use confplate::{parse, render, Config, Context, Engine, Error, ParseError, RenderError, Template};
use serde_json::json;

// ── Edge cases of the directive language ──

fn ctx(value: serde_json::Value) -> Context {
    Context::from_json(value).unwrap()
}

#[test]
fn empty_template_produces_empty_output() {
    assert_eq!(render("", &Context::new()).unwrap(), "");
}

#[test]
fn plain_text_template_no_directives() {
    let text = "Hello, world! [ % not a tag ] %]";
    assert_eq!(render(text, &Context::new()).unwrap(), text);
}

#[test]
fn missing_path_renders_empty() {
    assert_eq!(render("<[% a.b.c %]>", &Context::new()).unwrap(), "<>");
}

#[test]
fn truthiness_law() {
    let cases = [
        (json!(""), "N"),
        (json!("x"), "Y"),
        (json!(false), "N"),
        (json!(true), "Y"),
        (json!(0), "N"),
        (json!(0.0), "N"),
        (json!(7), "Y"),
        (json!([]), "N"),
        (json!([""]), "Y"),
        (json!({}), "Y"),
        (json!(null), "N"),
    ];
    for (value, expected) in cases {
        let context = ctx(json!({ "v": value.clone() }));
        assert_eq!(
            render("[% v ? 'Y' : 'N' %]", &context).unwrap(),
            expected,
            "value {}",
            value
        );
    }
    assert_eq!(render("[% v ? 'Y' : 'N' %]", &Context::new()).unwrap(), "N");
}

#[test]
fn default_or_spellings_agree() {
    let values = [json!(""), json!("a"), json!(0), json!(5), json!(true), json!(false)];
    for a in &values {
        for b in &values {
            let context = ctx(json!({ "a": a, "b": b }));
            assert_eq!(
                render("[% a || b %]", &context).unwrap(),
                render("[% a ? a : b %]", &context).unwrap(),
            );
        }
    }
}

#[test]
fn numbers_render_canonically() {
    let context = ctx(json!({"i": 3306, "f": 1.5, "whole": 2.0, "neg": -4}));
    assert_eq!(
        render("[% i %] [% f %] [% whole %] [% neg %] [% 10 %] [% 0.25 %]", &context).unwrap(),
        "3306 1.5 2 -4 10 0.25"
    );
}

#[test]
fn booleans_render_as_words() {
    assert_eq!(render("[% true %]/[% false %]", &Context::new()).unwrap(), "true/false");
}

#[test]
fn nested_if_blocks() {
    let tpl = "[% IF a %]A[% IF b %]B[% END %]a[% END %]";
    assert_eq!(render(tpl, &ctx(json!({"a": 1, "b": 1}))).unwrap(), "ABa");
    assert_eq!(render(tpl, &ctx(json!({"a": 1}))).unwrap(), "Aa");
    assert_eq!(render(tpl, &ctx(json!({"b": 1}))).unwrap(), "");
}

#[test]
fn unbalanced_if_end_never_renders() {
    for tpl in ["[% IF a %]x", "[% IF a %][% IF b %]x[% END %]"] {
        assert!(matches!(
            render(tpl, &Context::new()),
            Err(Error::Parse(ParseError::UnterminatedIf { .. }))
        ));
    }
    for tpl in ["x[% END %]", "[% IF a %][% END %][% END %]"] {
        assert!(matches!(
            render(tpl, &Context::new()),
            Err(Error::Parse(ParseError::UnmatchedEnd { .. }))
        ));
    }
}

#[test]
fn unterminated_directive_fails_closed() {
    match parse("ok [% database.host").unwrap_err() {
        ParseError::UnterminatedDirective { position } => assert_eq!(position.column, 4),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn invalid_expression_reports_token_and_position() {
    match parse("line\n  [% a ? 'x' %]").unwrap_err() {
        ParseError::InvalidExpression {
            found, position, ..
        } => {
            assert_eq!(found, "%]");
            assert_eq!(position.line, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn unterminated_string_is_a_parse_error() {
    assert!(matches!(
        parse("[% 'oops %]"),
        Err(ParseError::UnterminatedString { .. })
    ));
}

#[test]
fn sequence_output_requires_join() {
    let err = render("[% l %]", &ctx(json!({"l": ["a"]}))).unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::UnrenderableSequence { .. })));
    assert!(err.to_string().contains("use .join()"));
}

#[test]
fn unicode_literals_and_values() {
    let context = ctx(json!({"greeting": "こんにちは 🌍"}));
    assert_eq!(render("« [% greeting %] »", &context).unwrap(), "« こんにちは 🌍 »");
}

#[test]
fn special_characters_pass_through_unescaped() {
    let context = ctx(json!({"password": "p'a\"s$s\\"}));
    assert_eq!(
        render("'[% password %]'", &context).unwrap(),
        "'p'a\"s$s\\'"
    );
}

#[test]
fn crlf_templates_trim_cleanly() {
    let tpl = "a\r\n[% IF on -%]\r\nB\r\n[% END -%]\r\nc";
    assert_eq!(render(tpl, &ctx(json!({"on": true}))).unwrap(), "a\r\nB\r\nc");
}

#[test]
fn shared_template_renders_concurrently() {
    let template = std::sync::Arc::new(Template::parse("[% IF n %]n=[% n %][% END %]").unwrap());
    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let template = template.clone();
            std::thread::spawn(move || template.render(&Context::new().with("n", n)).unwrap())
        })
        .collect();
    let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outputs, vec!["n=1", "n=2", "n=3", "n=4"]);
}

#[test]
fn engine_with_custom_depth_limit() {
    let engine = Engine::new(Config {
        max_depth: 2,
        ..Config::default()
    });
    let deep = "[% IF a %][% IF b %][% IF c %]x[% END %][% END %][% END %]";
    assert!(matches!(
        engine.parse(deep),
        Err(ParseError::NestingTooDeep { max_depth: 2, .. })
    ));
    assert!(parse(deep).is_ok());
}

#[test]
fn deeply_nested_expressions_are_rejected_not_overflowed() {
    let bangs = format!("[% {}a %]", "!".repeat(10_000));
    let parens = format!("[% {}a{} %]", "(".repeat(10_000), ")".repeat(10_000));
    let chain = format!("[% a{} %]", " || a".repeat(10_000));
    for tpl in [bangs, parens, chain] {
        assert!(matches!(
            render(&tpl, &Context::new()),
            Err(Error::Parse(ParseError::NestingTooDeep { max_depth: 128, .. }))
        ));
    }
    let even = format!("[% {}a %]", "!".repeat(100));
    assert_eq!(render(&even, &ctx(json!({"a": "x"}))).unwrap(), "true");
}

#[test]
fn integers_beyond_i64_render_exactly() {
    let context = ctx(json!({"max": u64::MAX, "ids": [u64::MAX, 1]}));
    assert_eq!(
        render("[% max %] [% ids.join(',') %]", &context).unwrap(),
        "18446744073709551615 18446744073709551615,1"
    );
}

#[test]
fn keyword_named_keys_resolve() {
    let context = ctx(json!({"settings": {"true": "yes"}, "flags": {"END": 1}}));
    assert_eq!(
        render("[% settings.true %][% IF flags.END %]!end[% END %]", &context).unwrap(),
        "yes!end"
    );
}
