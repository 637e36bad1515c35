//! 后端等价性与长度界性质验证
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：解释执行后端是语义基准，特化编译后端必须对任意模板、任意目标产出逐字节相同的文本，
//!   并报告相同的 `is_dynamic`/`min_length`/`max_length`。
//! - **设计手法 (How)**：使用 Proptest 随机生成由静态文本、固定子模型、带长度提示与不带长度提示的闭包
//!   交错组成的片段序列；静态文本刻意混入引号、反斜杠、换行、响铃等需要转义的字符。
//! - **合同 (What)**：
//!   - 性质 1：两种后端输出与元数据一致；
//!   - 性质 2：长度界只随追加单调变化，一旦未知便保持未知，且已知界总是包住实际输出长度。

use std::sync::Arc;

use proptest::prelude::*;
use spark_textmodel::{
    Backend, CompilerConfig, CompilerServices, CompilingBackend, FnTextModel, InterpretingBackend,
    SharedTextModel, TextModelBuilder,
};

#[derive(Debug, Clone)]
struct Person {
    name: String,
    age: u8,
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Fixed(String),
    Name,
    Age,
}

fn tricky_char() -> impl Strategy<Value = char> {
    prop_oneof![
        3 => any::<char>(),
        1 => prop::sample::select(vec!['"', '\\', '\'', '\n', '\r', '\t', '\0', '\u{7}', '\u{7f}', '\u{85}', '#']),
    ]
}

fn tricky_text() -> impl Strategy<Value = String> {
    prop::collection::vec(tricky_char(), 0..6).prop_map(String::from_iter)
}

fn any_segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        3 => tricky_text().prop_map(Segment::Text),
        1 => tricky_text().prop_map(Segment::Fixed),
        2 => Just(Segment::Name),
        2 => Just(Segment::Age),
    ]
}

fn any_person() -> impl Strategy<Value = Person> {
    (tricky_text(), any::<u8>()).prop_map(|(name, age)| Person { name, age })
}

fn append<B: Backend<Person>>(builder: &mut TextModelBuilder<Person, B>, segment: &Segment) {
    let result = match segment {
        Segment::Text(text) => builder.append(text),
        Segment::Fixed(text) => builder.append_model(spark_textmodel::fixed(text.clone())),
        Segment::Name => builder.append_fn(|person: &Person| person.name.clone()),
        Segment::Age => builder.append_model(Arc::new(
            FnTextModel::new(|person: &Person| person.age.to_string())
                .with_length_hint(Some(1), Some(3)),
        )),
    };
    result.expect("builder is in Building state");
}

fn assemble<B: Backend<Person>>(backend: B, segments: &[Segment]) -> SharedTextModel<Person> {
    let mut builder = TextModelBuilder::new(backend);
    for segment in segments {
        append(&mut builder, segment);
    }
    builder.build_and_release().expect("assembly succeeds")
}

fn compiling() -> CompilingBackend {
    let services =
        CompilerServices::new(CompilerConfig::default()).expect("default config is valid");
    CompilingBackend::with_services(Arc::new(services))
}

fn expected(segments: &[Segment], person: &Person) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) | Segment::Fixed(text) => text.clone(),
            Segment::Name => person.name.clone(),
            Segment::Age => person.age.to_string(),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_backends_agree(
        segments in prop::collection::vec(any_segment(), 0..12),
        people in prop::collection::vec(any_person(), 1..4),
    ) {
        let interpreted = assemble(InterpretingBackend, &segments);
        let backend = compiling();
        let compiled = assemble(backend.clone(), &segments);

        prop_assert_eq!(interpreted.is_dynamic(), compiled.is_dynamic());
        prop_assert_eq!(interpreted.min_length(), compiled.min_length());
        prop_assert_eq!(interpreted.max_length(), compiled.max_length());
        for person in &people {
            let want = expected(&segments, person);
            prop_assert_eq!(interpreted.text(person), want.as_str());
            prop_assert_eq!(compiled.text(person), want.as_str());
        }
        prop_assert!(backend.services().correlation().is_empty());
    }

    #[test]
    fn prop_length_bound_is_monotonic(
        segments in prop::collection::vec(any_segment(), 1..12),
        person in any_person(),
    ) {
        let mut previous: Option<(Option<usize>, Option<usize>)> = None;
        for end in 0..=segments.len() {
            let model = assemble(InterpretingBackend, &segments[..end]);
            let (min, max) = (model.min_length(), model.max_length());
            let len = model.text(&person).len();
            if let Some(min) = min {
                prop_assert!(min <= len);
            }
            if let Some(max) = max {
                prop_assert!(len <= max);
            }
            if let Some((prev_min, prev_max)) = previous {
                match (prev_min, min) {
                    (None, current) => prop_assert_eq!(current, None),
                    (Some(prev), Some(current)) => prop_assert!(prev <= current),
                    (Some(_), None) => {}
                }
                match (prev_max, max) {
                    (None, current) => prop_assert_eq!(current, None),
                    (Some(prev), Some(current)) => prop_assert!(prev <= current),
                    (Some(_), None) => {}
                }
            }
            previous = Some((min, max));
        }
    }
}

#[test]
fn escaping_round_trips_through_compiled_units() {
    let literal = "quote \" backslash \\ newline \n bell \u{7} tab \t nul \0 del \u{7f}";
    for static_text in [literal, "\"", "\\", "\n", "\u{7}", "'", "#"] {
        let segments = [
            Segment::Text(static_text.to_owned()),
            Segment::Name,
            Segment::Text(static_text.to_owned()),
        ];
        let model = assemble(compiling(), &segments);
        let person = Person {
            name: "Eve".to_owned(),
            age: 30,
        };
        assert_eq!(model.text(&person), format!("{static_text}Eve{static_text}"));
    }
}

#[test]
fn repeated_renders_are_identical() {
    let segments = [
        Segment::Text("Hi ".to_owned()),
        Segment::Name,
        Segment::Text(", age ".to_owned()),
        Segment::Age,
    ];
    let person = Person {
        name: "Jarvis".to_owned(),
        age: 17,
    };
    for model in [assemble(InterpretingBackend, &segments), assemble(compiling(), &segments)] {
        let first = model.text(&person).into_owned();
        for _ in 0..8 {
            assert_eq!(model.text(&person), first);
        }
        assert_eq!(first, "Hi Jarvis, age 17");
    }
}
