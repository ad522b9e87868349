#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug)]
pub struct FormulaInput {
    pub text: String,
}

impl<'a> Arbitrary<'a> for FormulaInput {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let s: String = u.arbitrary()?;
        Ok(FormulaInput {
            text: s.chars().take(MAX_FORMULA_LENGTH).collect(),
        })
    }
}

const MAX_FORMULA_LENGTH: usize = 10000;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = arbitrary::Unstructured::new(data).arbitrary::<FormulaInput>() {
        formula_sql::fuzz_helper::compile_everywhere(&input.text);
    }
});
