use ndarray::Array1;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{Error, Result};
use crate::model::{Attribute, Model, Scale};

/// A forgiving, non-DEXi-faithful reader for the model's XML-like shape: a
/// tree of `<ATTRIBUTE name="...">` tags, each carrying a `<SCALE>`, an
/// optional `<DESCRIPTION>`/`<GROUP>`, an optional `<FUNCTION>` table, and
/// nested child attributes. The core never sees this grammar; it only
/// consumes the [`Model`] this module builds.
#[derive(Parser)]
#[grammar = "io/model.pest"]
struct ModelGrammar;

struct RawAttribute {
    name: String,
    description: Option<String>,
    group: Option<String>,
    scale_values: Vec<String>,
    function_values: Option<Vec<String>>,
    children: Vec<RawAttribute>,
}

/// Parses `input` into a validated [`Model`].
pub fn parse_model(input: &str) -> Result<Model> {
    let mut pairs = ModelGrammar::parse(Rule::model, input)?;
    let model_pair = pairs
        .next()
        .ok_or_else(|| Error::ModelParseError("empty model document".into()))?;
    let attribute_pair = model_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::attribute)
        .ok_or_else(|| Error::ModelParseError("model has no root attribute".into()))?;
    let raw = build_raw(attribute_pair)?;
    build_model(raw)
}

fn build_raw(pair: Pair<Rule>) -> Result<RawAttribute> {
    let mut name = None;
    let mut description = None;
    let mut group = None;
    let mut scale_values = None;
    let mut function_values = None;
    let mut children = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name_attr => {
                let value = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::name_value)
                    .ok_or_else(|| Error::ModelParseError("attribute missing a name".into()))?;
                name = Some(value.as_str().to_string());
            }
            Rule::description_tag => description = Some(tag_text(inner)?),
            Rule::group_tag => group = Some(tag_text(inner)?),
            Rule::scale_tag => {
                scale_values = Some(
                    inner
                        .into_inner()
                        .map(tag_text)
                        .collect::<Result<Vec<String>>>()?,
                );
            }
            Rule::function_tag => {
                function_values = Some(
                    inner
                        .into_inner()
                        .map(tag_text)
                        .collect::<Result<Vec<String>>>()?,
                );
            }
            Rule::attribute => children.push(build_raw(inner)?),
            _ => {}
        }
    }

    Ok(RawAttribute {
        name: name.ok_or_else(|| Error::ModelParseError("attribute missing a name".into()))?,
        description,
        group,
        scale_values: scale_values
            .ok_or_else(|| Error::ModelParseError("attribute missing a scale".into()))?,
        function_values,
        children,
    })
}

/// Extracts a tag's single wrapped `text` token (e.g. `value_tag`, `description_tag`).
fn tag_text(pair: Pair<Rule>) -> Result<String> {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| Error::InternalError("model grammar tag missing its text token".into()))
}

fn build_model(raw: RawAttribute) -> Result<Model> {
    let mut attributes = Vec::new();
    build_node(raw, &mut attributes)?;
    Model::new(attributes)
}

/// Reserves this node's index before recursing into its children, so that
/// pre-order traversal lands the root at index `0` without a remapping pass.
fn build_node(raw: RawAttribute, attributes: &mut Vec<Attribute>) -> Result<usize> {
    let index = attributes.len();
    attributes.push(Attribute::leaf(String::new(), Scale::new(true, ["_"])?));

    let scale = Scale::new(true, raw.scale_values)?;

    let attribute = if raw.children.is_empty() {
        let mut attribute = Attribute::leaf(raw.name, scale);
        attribute.description = raw.description;
        attribute.group = raw.group;
        attribute
    } else {
        let child_scale_sizes: Vec<usize> =
            raw.children.iter().map(|c| c.scale_values.len()).collect();
        let mut child_indices = Vec::with_capacity(raw.children.len());
        for child in raw.children {
            child_indices.push(build_node(child, attributes)?);
        }

        let function_values = raw.function_values.ok_or_else(|| {
            Error::ModelParseError(format!(
                "attribute '{}' has children but no aggregation table",
                raw.name
            ))
        })?;
        let table = encode_table(&scale, &function_values)?;

        let mut attribute =
            Attribute::inner(raw.name, scale, child_indices, child_scale_sizes, table)?;
        attribute.description = raw.description;
        attribute.group = raw.group;
        attribute
    };

    attributes[index] = attribute;
    Ok(index)
}

fn encode_table(scale: &Scale, values: &[String]) -> Result<Array1<u8>> {
    values
        .iter()
        .map(|v| {
            scale.index_of(v).map(|i| i as u8).ok_or_else(|| {
                Error::ModelParseError(format!("function value '{v}' is not in its scale"))
            })
        })
        .collect::<Result<Vec<u8>>>()
        .map(Array1::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY_MODEL: &str = r#"
        <ATTRIBUTE name="root">
            <SCALE><VALUE>bad</VALUE><VALUE>good</VALUE></SCALE>
            <FUNCTION>
                <VALUE>bad</VALUE><VALUE>bad</VALUE><VALUE>bad</VALUE>
                <VALUE>good</VALUE><VALUE>good</VALUE><VALUE>good</VALUE>
            </FUNCTION>
            <ATTRIBUTE name="a">
                <DESCRIPTION>first basic attribute</DESCRIPTION>
                <SCALE><VALUE>lo</VALUE><VALUE>hi</VALUE></SCALE>
            </ATTRIBUTE>
            <ATTRIBUTE name="b">
                <SCALE><VALUE>lo</VALUE><VALUE>mid</VALUE><VALUE>hi</VALUE></SCALE>
            </ATTRIBUTE>
        </ATTRIBUTE>
    "#;

    #[test]
    fn parses_root_scale_and_leaf_order() {
        let model = parse_model(TOY_MODEL).unwrap();
        assert_eq!(model.root().name, "root");
        assert_eq!(model.class_count(), 2);
        assert_eq!(model.leaf_count(), 2);
        assert_eq!(model.index_of("a"), Some(1));
        assert_eq!(model.index_of("b"), Some(2));
    }

    #[test]
    fn carries_optional_description() {
        let model = parse_model(TOY_MODEL).unwrap();
        let a = &model.attributes()[model.index_of("a").unwrap()];
        assert_eq!(a.description.as_deref(), Some("first basic attribute"));
    }

    #[test]
    fn rejects_inner_attribute_without_function() {
        let broken = r#"
            <ATTRIBUTE name="root">
                <SCALE><VALUE>bad</VALUE><VALUE>good</VALUE></SCALE>
                <ATTRIBUTE name="a">
                    <SCALE><VALUE>lo</VALUE><VALUE>hi</VALUE></SCALE>
                </ATTRIBUTE>
                <ATTRIBUTE name="b">
                    <SCALE><VALUE>lo</VALUE><VALUE>hi</VALUE></SCALE>
                </ATTRIBUTE>
            </ATTRIBUTE>
        "#;
        assert!(parse_model(broken).is_err());
    }

    #[test]
    fn rejects_function_value_outside_scale() {
        let broken = r#"
            <ATTRIBUTE name="root">
                <SCALE><VALUE>bad</VALUE><VALUE>good</VALUE></SCALE>
                <FUNCTION><VALUE>bad</VALUE><VALUE>ugly</VALUE></FUNCTION>
                <ATTRIBUTE name="a">
                    <SCALE><VALUE>lo</VALUE><VALUE>hi</VALUE></SCALE>
                </ATTRIBUTE>
            </ATTRIBUTE>
        "#;
        assert!(parse_model(broken).is_err());
    }
}
