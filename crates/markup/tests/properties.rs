//! Seeded property runs. `MARKUP_PROPERTY_RUNS` and `MARKUP_PROPERTY_SEED`
//! (decimal or `0x` hex) override the defaults.

use markup::escape::{escape_bytes, escape_text};
use markup::{Quoted, Safe, SafeBytes, SafeText, Value, quote};
use markup_test_support::{Lcg, env_u64, escape_bytes_for_display};

const DEFAULT_RUNS: u64 = 512;
const DEFAULT_SEED: u64 = 0x6d61_726b_7570;

const TEXT_ATOMS: &[&str] = &["a", "Z", " ", "<", ">", "&", "\"", "'", "&amp;", "é", "€", "\n", "%"];
const BYTE_ATOMS: &[&[u8]] = &[b"a", b"<", b">", b"&", b"'", b"\"", "é".as_bytes(), b"\xFF", b"\xE2", b"\x80"];

fn runs() -> u64 {
    env_u64("MARKUP_PROPERTY_RUNS", DEFAULT_RUNS)
}

fn seed() -> u64 {
    env_u64("MARKUP_PROPERTY_SEED", DEFAULT_SEED)
}

fn gen_text(rng: &mut Lcg) -> String {
    let len = rng.gen_range(12);
    (0..len).map(|_| *rng.pick(TEXT_ATOMS)).collect()
}

fn gen_bytes(rng: &mut Lcg) -> Vec<u8> {
    let len = rng.gen_range(12);
    (0..len).flat_map(|_| rng.pick(BYTE_ATOMS).iter().copied()).collect()
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[test]
fn escaping_is_reversible_and_leaves_no_specials() {
    let mut rng = Lcg::new(seed());
    for run in 0..runs() {
        let input = gen_text(&mut rng);
        let escaped = escape_text(&input);
        assert!(
            !escaped.contains(['<', '>', '"', '\'']),
            "run {run}: raw special left in {escaped:?}"
        );
        assert_eq!(unescape(&escaped), input, "run {run}");
    }
}

#[test]
fn quoting_is_idempotent() {
    let mut rng = Lcg::new(seed() ^ 1);
    for run in 0..runs() {
        let input = gen_text(&mut rng);
        let once = match quote(input.as_str()).unwrap() {
            Quoted::Text(t) => t,
            other => panic!("run {run}: text quoted to {other:?}"),
        };
        let twice = match quote(once.clone()).unwrap() {
            Quoted::Text(t) => t,
            other => panic!("run {run}: safe text quoted to {other:?}"),
        };
        assert_eq!(once, twice, "run {run}: input {input:?}");
    }
}

#[test]
fn text_concat_appends_escaped_operand() {
    let mut rng = Lcg::new(seed() ^ 2);
    for run in 0..runs() {
        let base = SafeText::new(gen_text(&mut rng));
        let operand = gen_text(&mut rng);
        let got = base.concat(operand.as_str()).unwrap();
        let want = format!("{}{}", base.as_str(), escape_text(&operand));
        assert_eq!(got.as_str(), want, "run {run}");

        let safe_operand = SafeText::new(operand.clone());
        let got = base.concat(safe_operand).unwrap();
        assert_eq!(got.as_str(), format!("{}{operand}", base.as_str()), "run {run}");
    }
}

#[test]
fn text_format_matches_concat() {
    let mut rng = Lcg::new(seed() ^ 3);
    for run in 0..runs() {
        let prefix = gen_text(&mut rng).replace('%', "%%");
        let operand = gen_text(&mut rng);
        let template = SafeText::new(format!("{prefix}%s"));
        let formatted = template.format((operand.as_str(),)).unwrap();
        let concatenated = SafeText::new(prefix.replace("%%", "%"))
            .concat(operand.as_str())
            .unwrap();
        assert_eq!(formatted, concatenated, "run {run}");
    }
}

#[test]
fn byte_concat_escalates_only_on_undecodable_input() {
    let mut rng = Lcg::new(seed() ^ 4);
    for run in 0..runs() {
        let base = gen_bytes(&mut rng);
        let operand = gen_bytes(&mut rng);
        let escaped = escape_bytes(&operand).into_owned();
        let mut joined = base.clone();
        joined.extend_from_slice(&escaped);

        let got = SafeBytes::new(base.clone()).concat(operand.clone()).unwrap();
        let strict = std::str::from_utf8(&base).is_ok() && std::str::from_utf8(&escaped).is_ok();
        match got {
            Safe::Bytes(b) => {
                assert!(strict, "run {run}: undecodable input stayed bytes");
                assert_eq!(b.as_bytes(), joined.as_slice(), "run {run}");
            }
            Safe::Text(t) => {
                assert!(
                    !strict,
                    "run {run}: decodable input escalated: {}",
                    escape_bytes_for_display(&joined)
                );
                let want = format!(
                    "{}{}",
                    String::from_utf8_lossy(&base),
                    String::from_utf8_lossy(&escaped)
                );
                assert_eq!(t.as_str(), want, "run {run}");
            }
        }
    }
}

#[test]
fn text_operand_always_promotes_byte_markup() {
    let mut rng = Lcg::new(seed() ^ 5);
    for run in 0..runs() {
        let base = SafeBytes::new(gen_bytes(&mut rng));
        let operand = gen_text(&mut rng);
        let got = base.concat(Value::Text(operand)).unwrap();
        assert!(got.is_text(), "run {run}");
    }
}

const TEMPLATE_ATOMS: &[&str] = &[
    "%", "%%", "s", "r", "c", "d", "x", "f", "g", "e", "*", ".", "-", "0", "#", "9", "99999",
    "99999999999999999999", "(k)", "<", "&", "a",
];

#[test]
fn arbitrary_templates_fail_without_panicking() {
    let mut rng = Lcg::new(seed() ^ 6);
    let args = markup::FormatArgs::tuple([
        Value::from("<x>"),
        Value::from(i64::MAX),
        Value::from(-7),
        Value::from(2.5),
        Value::from(&b"\xFF&"[..]),
    ]);
    for run in 0..runs() {
        let len = rng.gen_range(10);
        let template: String = (0..len).map(|_| *rng.pick(TEMPLATE_ATOMS)).collect();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = SafeText::new(template.as_str()).format(args.clone());
            let _ = SafeBytes::new(template.as_bytes().to_vec()).format(args.clone());
        }));
        assert!(outcome.is_ok(), "run {run}: template {template:?} panicked");
    }
}
