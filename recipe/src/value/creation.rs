use syntax::ast::Rhs;

use super::{Error, ParamValue};

/// Global recipe variables, by name.
pub type Globals = util::HashMap<String, ParamValue>;

/// Turn a parsed right-hand-side into a [`ParamValue`],
/// looking up any variables in `globals`.
pub fn create_value(rhs: &Rhs, globals: &Globals) -> Result<ParamValue, Error> {
    match rhs {
        Rhs::Literal { val } => Ok(ParamValue::from_text(val)),
        Rhs::Bare { val } => Ok(ParamValue::from_bare(val)),
        Rhs::Variable { name } => globals
            .get(*name)
            .cloned()
            .ok_or_else(|| Error::UndefinedVariable((*name).to_owned())),
        Rhs::Interp { text, .. } => Ok(ParamValue::from_text(&interpolate(text, globals)?)),
        Rhs::List(rhss) => rhss
            .iter()
            .map(|rhs| create_value(rhs, globals))
            .collect::<Result<_, _>>()
            .map(ParamValue::List),
    }
}

/// Substitute `$var` and `${var}` in `text` with the values of global variables.
pub fn interpolate(text: &str, globals: &Globals) -> Result<String, Error> {
    let mut out = String::with_capacity(text.len() * 2);
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, remainder) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], &braced[end + 1..]),
                None => (braced, ""),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], &after[end..])
            }
        };
        let val = globals
            .get(name)
            .ok_or_else(|| Error::UndefinedVariable(name.to_owned()))?;
        if let ParamValue::List(_) = val {
            return Err(Error::ExpectedScalar(name.to_owned()));
        }
        out.push_str(&val.to_string());
        rest = remainder;
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::PathRef;

    fn globals() -> Globals {
        let mut globals = Globals::default();
        globals.insert("prefix".to_owned(), ParamValue::from_text("26_019"));
        globals.insert("refant".to_owned(), ParamValue::Int(7));
        globals.insert(
            "bad_ants".to_owned(),
            ParamValue::List(vec![ParamValue::Int(30)]),
        );
        globals
    }

    #[test]
    fn test_interpolate() -> anyhow::Result<()> {
        let globals = globals();
        assert_eq!("26_019.G0", interpolate("$prefix.G0", &globals)?);
        assert_eq!("26_019_x", interpolate("${prefix}_x", &globals)?);
        assert_eq!("ant 7.", interpolate("ant $refant.", &globals)?);
        assert_eq!("no vars", interpolate("no vars", &globals)?);
        assert!(matches!(
            interpolate("$missing", &globals),
            Err(Error::UndefinedVariable(name)) if name == "missing"
        ));
        assert!(matches!(
            interpolate("$bad_ants", &globals),
            Err(Error::ExpectedScalar(_))
        ));
        Ok(())
    }

    #[test]
    fn test_create_value() -> anyhow::Result<()> {
        let globals = globals();
        assert_eq!(
            ParamValue::Ref(PathRef {
                name: "26_019.B0".to_owned(),
                role: "output".to_owned(),
            }),
            create_value(
                &Rhs::Interp {
                    text: "${prefix}.B0:output",
                    vars: vec!["prefix"],
                },
                &globals
            )?
        );
        assert_eq!(
            ParamValue::List(vec![ParamValue::Int(7), ParamValue::Bool(true)]),
            create_value(
                &Rhs::List(vec![
                    Rhs::Variable { name: "refant" },
                    Rhs::Bare { val: "true" },
                ]),
                &globals
            )?
        );
        // quoted values are never re-typed:
        assert_eq!(
            ParamValue::Str("7".to_owned()),
            create_value(&Rhs::Literal { val: "7" }, &globals)?
        );
        Ok(())
    }
}
