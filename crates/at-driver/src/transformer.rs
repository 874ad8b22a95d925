use at_search::{CodeTransformer, CodeVariant};
use at_types::{driver_error, ParameterBinding, TuneResult};

/// Substitutes `${NAME}` placeholders in each code fragment with the bound
/// parameter value and concatenates the fragments into one variant.
#[derive(Debug, Default, Clone)]
pub struct TemplateTransformer;

impl TemplateTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(fragment: &str, binding: &ParameterBinding) -> TuneResult<String> {
        let mut out = String::with_capacity(fragment.len());
        let mut rest = fragment;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| driver_error!("unterminated placeholder in template: {}", &rest[start..]))?;
            let name = after[..end].trim();
            let value = binding
                .get(name)
                .ok_or_else(|| driver_error!("template placeholder ${{{name}}} is not a tuning parameter"))?;
            out.push_str(&value.to_string());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl CodeTransformer for TemplateTransformer {
    fn optimize(
        &mut self,
        fragments: &[String],
        binding: &ParameterBinding,
    ) -> TuneResult<Vec<CodeVariant>> {
        let code = fragments
            .iter()
            .map(|fragment| Self::render(fragment, binding))
            .collect::<TuneResult<Vec<_>>>()?
            .join("\n");
        Ok(vec![CodeVariant {
            code,
            metadata: serde_json::to_value(binding)?,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use at_types::{ParamValue, TuneError};

    fn binding() -> ParameterBinding {
        let mut binding = ParameterBinding::new();
        binding.insert("T1".into(), ParamValue::Int(16));
        binding.insert("ORDER".into(), ParamValue::Str("ijk".into()));
        binding
    }

    #[test]
    fn substitutes_placeholders() {
        let code = TemplateTransformer::render(
            "for (ii = 0; ii < N; ii += ${T1}) /* ${ ORDER } */",
            &binding(),
        )
        .unwrap();
        assert_eq!(code, "for (ii = 0; ii < N; ii += 16) /* ijk */");
    }

    #[test]
    fn produces_exactly_one_variant() {
        let mut transformer = TemplateTransformer::new();
        let variants = transformer
            .optimize(&["a = ${T1};".into(), "b = 2;".into()], &binding())
            .unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].code, "a = 16;\nb = 2;");
        assert_eq!(variants[0].metadata["T1"], 16);
    }

    #[test]
    fn unknown_or_unterminated_placeholder_fails() {
        let err = TemplateTransformer::render("x = ${U1};", &binding()).unwrap_err();
        assert!(matches!(err, TuneError::Driver(_)));
        assert!(TemplateTransformer::render("x = ${T1", &binding()).is_err());
    }
}
