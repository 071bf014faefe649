use std::path::PathBuf;

use markup::{FormatArgs, Quoted, Safe, SafeBytes, SafeText, Value, quote, quote_with};
use markup_test_support::{
    FixtureArg, Flavor, GoldenCase, GoldenOp, decode_escaped_bytes, diff_lines,
    escape_bytes_for_display, escape_for_display, load_golden,
};

fn fixture_path() -> PathBuf {
    match std::env::var("MARKUP_GOLDEN_FIXTURE") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("golden.toml"),
    }
}

fn to_value(arg: &FixtureArg) -> Value {
    match arg {
        FixtureArg::Text(s) => Value::Text(s.clone()),
        FixtureArg::Bytes(raw) => Value::Bytes(decode_escaped_bytes(raw)),
        FixtureArg::SafeText(s) => Value::SafeText(SafeText::new(s.as_str())),
        FixtureArg::SafeBytes(raw) => Value::SafeBytes(SafeBytes::new(decode_escaped_bytes(raw))),
        FixtureArg::Int(i) => Value::from(*i),
        FixtureArg::Float(f) => Value::from(*f),
        FixtureArg::None(_) => Value::None,
    }
}

#[derive(Debug, PartialEq)]
struct Rendered {
    flavor: Flavor,
    display: String,
}

impl Rendered {
    fn from_safe(safe: Safe) -> Self {
        match safe {
            Safe::Text(t) => Self::text(t),
            Safe::Bytes(b) => Self::bytes(b),
        }
    }

    fn text(t: SafeText) -> Self {
        Self {
            flavor: Flavor::Text,
            display: escape_for_display(t.as_str()),
        }
    }

    fn bytes(b: SafeBytes) -> Self {
        Self {
            flavor: Flavor::Bytes,
            display: escape_bytes_for_display(b.as_bytes()),
        }
    }
}

fn expected(case: &GoldenCase) -> Rendered {
    match case.expect_flavor {
        Flavor::Text => Rendered {
            flavor: Flavor::Text,
            display: escape_for_display(&case.expect),
        },
        Flavor::Bytes => Rendered {
            flavor: Flavor::Bytes,
            display: escape_bytes_for_display(&decode_escaped_bytes(&case.expect)),
        },
    }
}

fn single_arg(case: &GoldenCase) -> Value {
    assert_eq!(case.args.len(), 1, "case {} needs exactly one arg", case.id);
    to_value(&case.args[0])
}

fn run_case(case: &GoldenCase) -> Result<Rendered, markup::MarkupError> {
    let values: Vec<Value> = case.args.iter().map(to_value).collect();
    let text_base = || SafeText::new(case.base.as_str());
    let bytes_base = || SafeBytes::new(decode_escaped_bytes(&case.base));
    Ok(match (case.op, case.flavor) {
        (GoldenOp::Quote, _) => {
            let arg = single_arg(case);
            let quoted = match case.prefer_text {
                Some(prefer) => quote_with(arg, prefer)?,
                None => quote(arg)?,
            };
            match quoted {
                Quoted::Number(n) => Rendered {
                    flavor: Flavor::Text,
                    display: n.to_string(),
                },
                other => Rendered::from_safe(other.into_safe()),
            }
        }
        (GoldenOp::Concat, Flavor::Text) => Rendered::text(text_base().concat(single_arg(case))?),
        (GoldenOp::Concat, Flavor::Bytes) => {
            Rendered::from_safe(bytes_base().concat(single_arg(case))?)
        }
        (GoldenOp::Radd, Flavor::Text) => Rendered::text(text_base().radd(single_arg(case))?),
        (GoldenOp::Radd, Flavor::Bytes) => Rendered::from_safe(bytes_base().radd(single_arg(case))?),
        (GoldenOp::Join, Flavor::Text) => Rendered::text(text_base().join(values)?),
        (GoldenOp::Join, Flavor::Bytes) => Rendered::from_safe(bytes_base().join(values)?),
        (GoldenOp::Repeat, Flavor::Text) => Rendered::text(text_base().repeat(case.count)),
        (GoldenOp::Repeat, Flavor::Bytes) => Rendered::bytes(bytes_base().repeat(case.count)),
        (GoldenOp::Format, flavor) => {
            let args = if case.tuple {
                FormatArgs::Tuple(values)
            } else {
                FormatArgs::Single(single_arg(case))
            };
            match flavor {
                Flavor::Text => Rendered::text(text_base().format(args)?),
                Flavor::Bytes => Rendered::from_safe(bytes_base().format(args)?),
            }
        }
    })
}

#[test]
fn golden_cases_render_as_expected() {
    let path = fixture_path();
    let cases = load_golden(&path);
    let filter = std::env::var("MARKUP_GOLDEN_FILTER").unwrap_or_default();

    let mut expected_lines = Vec::new();
    let mut actual_lines = Vec::new();
    let mut ran = 0usize;
    for case in cases.iter().filter(|c| c.id.contains(filter.as_str())) {
        ran += 1;
        let want = expected(case);
        expected_lines.push(format!("{}: {:?} {}", case.id, want.flavor, want.display));
        let line = match run_case(case) {
            Ok(got) => format!("{}: {:?} {}", case.id, got.flavor, got.display),
            Err(err) => format!("{}: error {err}", case.id),
        };
        actual_lines.push(line);
    }

    assert!(ran > 0, "no golden cases matched filter {filter:?} in {path:?}");
    if expected_lines != actual_lines {
        panic!(
            "golden mismatch in {path:?}\n{}",
            diff_lines(&expected_lines, &actual_lines)
        );
    }
}
