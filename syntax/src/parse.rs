use anyhow::Result;

#[derive(Debug, thiserror::Error)]
#[error("ParseError on line {line_num} '{line}': {msg}")]
pub struct Error {
    msg: String,
    line_num: usize,
    line: String,
}

pub fn parse(text: &str) -> Result<Vec<crate::ast::Item<'_>>> {
    use combine::EasyParser;
    recipe::items()
        .easy_parse(text)
        .map(|(items, _remainder)| items)
        .map_err(|e| {
            let pos = e.position.translate_position(text);
            // isolate the line in question:
            let before = &text[0..pos];
            let after = &text[pos..text.len()];
            let prefix: String = before.chars().rev().take_while(|&c| c != '\n').collect();
            let prefix: String = prefix.chars().rev().collect();
            let suffix: String = after.chars().take_while(|&c| c != '\n').collect();
            let line = prefix + &suffix;
            // since converting combine's errors is a lifetime nightmare,
            // we just stringify the error before returning it.
            Error {
                line_num: before.matches('\n').count() + 1,
                line,
                msg: format!("{}", e),
            }
            .into()
        })
}

pub mod prelude {
    pub use combine::parser::char::{char, string};
    pub use combine::parser::range::recognize;
    pub use combine::*;
}

pub mod util {

    use super::prelude::*;
    use combine::parser::char::{alpha_num, letter, space};

    p! {
        ident_start() -> char, {
            char('_').or(letter())
        }
    }

    p! {
        ident_rest() -> Vec<char>, {
            many(char('_').or(alpha_num()))
        }
    }

    p! {
        ident() -> &'a str, {
            recognize(ident_start().and(ident_rest()))
        }
    }

    // param keys can contain dashes (e.g. wsclean's "auto-threshold").
    p! {
        key_rest() -> Vec<char>, {
            many(char('_').or(char('-')).or(alpha_num()))
        }
    }

    p! {
        key() -> &'a str, {
            recognize(ident_start().and(key_rest()))
        }
    }

    // unlike other idents, plan names can start w/ a number (e.g. "1gc").
    p! {
        name_ident() -> &'a str, {
            recognize(skip_many1(char('_').or(alpha_num())))
        }
    }

    // tool ids look like "casa_flagdata" or "cab/casa_flagdata".
    p! {
        tool_ident() -> &'a str, {
            recognize(skip_many1(satisfy(|c: char| {
                c.is_alphanumeric() || c == '_' || c == '-' || c == '/' || c == '.'
            })))
        }
    }

    p! {
        comment() -> &'a str, {
            recognize(
                char('#').and(skip_many(none_of("\n".chars())))
            )
        }
    }

    p! {
        whitespace() -> (), {
            skip_many1(
                space().map(|_| ()).or(comment().map(|_| ()))
            )
        }
    }

    // parser, followed by optional whitespace. Leading whitespace is
    // always consumed by whatever came before, so repeated lexed parsers
    // fail cleanly at the first token they don't recognize.
    wrapper! {
        lex(parser), {
            parser.skip(optional(whitespace()))
        }
    }

    wrapper! {
        braces(parser), {
            char('{').with(parser).skip(char('}'))
        }
    }

}

mod keyword {
    use super::prelude::*;
    use super::util::whitespace;

    // keywords that introduce a name must be followed by whitespace,
    // so that e.g. a task named "snapshot_ms" isn't mistaken for a snapshot.

    p! {
        task() -> (), {
            attempt(string("task").skip(whitespace())).map(|_| ())
        }
    }

    p! {
        tool() -> (), {
            attempt(string("tool").skip(whitespace())).map(|_| ())
        }
    }

    p! {
        plan() -> (), {
            attempt(string("plan").skip(whitespace())).map(|_| ())
        }
    }

    p! {
        label() -> (), {
            attempt(string("label").skip(whitespace())).map(|_| ())
        }
    }

    p! {
        snapshot() -> (), {
            attempt(string("snapshot").skip(whitespace())).map(|_| ())
        }
    }

    p! {
        global() -> (), {
            attempt(string("global").skip(optional(whitespace()))).map(|_| ())
        }
    }

    p! {
        roots() -> (), {
            attempt(string("roots").skip(optional(whitespace()))).map(|_| ())
        }
    }
}

mod literal {

    use super::prelude::*;
    use super::util::{braces, ident};
    use combine::parser::range::recognize_with_value;

    const FORBID_UNQUOTED: [char; 12] =
        ['(', ')', '[', ']', '{', '}', ',', '$', '#', '"', '\'', '='];

    wrapper! {
        double_quotes(parser), {
            char('"').with(parser).skip(char('"'))
        }
    }

    p! {
        unquoted_literal_char() -> char, {
            satisfy(|c: char|
                !c.is_whitespace() && !FORBID_UNQUOTED.iter().any(|&forbidden| forbidden == c)
            )
        }
    }

    p! {
        unquoted_literal() -> &'a str, {
            recognize(skip_many1(unquoted_literal_char()))
        }
    }

    // $var or ${var}
    p! {
        interp_variable() -> &'a str, {
            char('$').with(braces(ident()).or(ident()))
        }
    }

    p! {
        interp_content() -> (&'a str, Vec<&'a str>), {
            recognize_with_value(
                skip_many(none_of("$\"".chars()))
                    .with(optional(interp_variable().and(interp_content())))
            ).map(|(full_text, parsed_suffix)| {
                if let Some((var, (_, mut rest_vars))) = parsed_suffix {
                    rest_vars.insert(0, var);
                    (full_text, rest_vars)
                } else {
                    (full_text, Vec::with_capacity(0))
                }
            })
        }
    }

    p! {
        double_quoted_string() -> (&'a str, Vec<&'a str>), {
            double_quotes(interp_content())
        }
    }

    #[cfg(test)]
    mod test {
        use anyhow::Result;
        use combine::EasyParser;
        #[test]
        fn test_unquoted() -> Result<()> {
            assert_eq!(
                "filenames.are.ok",
                super::unquoted_literal().easy_parse("filenames.are.ok").unwrap().0
            );
            assert_eq!(
                ("0:50~206", " next"),
                super::unquoted_literal().easy_parse("0:50~206 next").unwrap()
            );
            assert_eq!(
                ("J1035+5628", ","),
                super::unquoted_literal().easy_parse("J1035+5628,").unwrap()
            );
            Ok(())
        }
        #[test]
        fn test_quoted() -> Result<()> {
            assert_eq!(
                ("quoted text", Vec::<&str>::new()),
                super::double_quoted_string().easy_parse("\"quoted text\"").unwrap().0
            );
            assert_eq!(
                ("", Vec::<&str>::new()),
                super::double_quoted_string().easy_parse("\"\"").unwrap().0
            );
            assert_eq!(
                ("${prefix}.G0:$role", vec!["prefix", "role"]),
                super::double_quoted_string()
                    .easy_parse("\"${prefix}.G0:$role\" won't parse this")
                    .unwrap()
                    .0
            );
            Ok(())
        }
    }
}

mod rhs {
    use super::literal::{double_quoted_string, unquoted_literal};
    use super::prelude::*;
    use super::util::{ident, lex};
    use crate::ast::Rhs;

    p! {
        variable() -> &'a str, {
            char('$').with(ident())
        }
    }

    p! {
        list() -> Vec<Rhs<'a>>, {
            lex(char('['))
                .with(sep_end_by(lex(rhs()), lex(char(','))))
                .skip(char(']'))
        }
    }

    p! {
        rhs() -> Rhs<'a>, {
            choice!(
                list().map(Rhs::List),
                double_quoted_string().map(|(text, vars)| {
                    if vars.is_empty() {
                        Rhs::Literal { val: text }
                    } else {
                        Rhs::Interp { text, vars }
                    }
                }),
                variable().map(|name| Rhs::Variable { name }),
                unquoted_literal().map(|val| Rhs::Bare { val })
            )
        }
    }

}

mod assignment {
    use super::prelude::*;
    use super::rhs::rhs;
    use super::util::{key, lex};
    use crate::ast::Rhs;

    p! {
        assignment() -> (&'a str, Rhs<'a>), {
            lex(key()).skip(lex(char('='))).and(rhs())
        }
    }

    // { key = value ... }
    p! {
        assignments() -> Vec<(&'a str, Rhs<'a>)>, {
            lex(char('{'))
                .with(many(lex(assignment())))
                .skip(char('}'))
        }
    }

    #[cfg(test)]
    mod test {
        use crate::ast::Rhs;
        use anyhow::Result;
        use combine::EasyParser;
        #[test]
        fn test_assignment() -> Result<()> {
            assert_eq!(
                ("var", Rhs::bare("value")),
                super::assignment().easy_parse("var=value").unwrap().0
            );
            assert_eq!(
                ("spw", Rhs::literal("")),
                super::assignment().easy_parse("spw = \"\"").unwrap().0
            );
            Ok(())
        }
        #[test]
        fn test_assignments() -> Result<()> {
            assert_eq!(
                vec![
                    ("mode", Rhs::bare("manual")),
                    ("autocorr", Rhs::bare("true")),
                ],
                super::assignments()
                    .easy_parse("{\n  mode = manual # flag it\n  autocorr = true\n}")
                    .unwrap()
                    .0
            );
            assert!(super::assignments().easy_parse("{}").unwrap().0.is_empty());
            Ok(())
        }
    }
}

mod task {
    use super::assignment::assignments;
    use super::keyword;
    use super::prelude::*;
    use super::rhs::rhs;
    use super::util::{ident, lex, tool_ident};
    use crate::ast::{BlockSpec, TaskBlock};

    p! {
        block_spec() -> BlockSpec<'a>, {
            choice!(
                keyword::label().with(rhs()).map(BlockSpec::Label),
                lex(char('<')).with(rhs()).map(BlockSpec::Input),
                lex(char('>')).with(rhs()).map(BlockSpec::Output)
            )
        }
    }

    p! {
        task() -> TaskBlock<'a>, {
            keyword::task()
                .with(lex(ident()))
                .skip(lex(char(':')))
                .and(lex(tool_ident()))
                .and(many(lex(block_spec())))
                .and(assignments())
                .map(|(((name, tool), specs), params)| TaskBlock {
                    name,
                    tool,
                    specs,
                    params,
                })
        }
    }

    #[cfg(test)]
    mod test {
        use crate::ast::{BlockSpec, Rhs, TaskBlock};
        use anyhow::Result;
        use combine::EasyParser;
        #[test]
        fn test_task() -> Result<()> {
            assert_eq!(
                TaskBlock {
                    name: "quack_flagging",
                    tool: "cab/casa_flagdata",
                    specs: vec![
                        BlockSpec::Label(Rhs::literal("quack_flagging:: Quack flagging")),
                        BlockSpec::Input(Rhs::bare("input")),
                        BlockSpec::Output(Rhs::variable("out")),
                    ],
                    params: vec![
                        ("msname", Rhs::variable("msname")),
                        ("quackinterval", Rhs::bare("30.0")),
                    ],
                },
                super::task()
                    .easy_parse(
                        "task quack_flagging : cab/casa_flagdata\n  \
                         label \"quack_flagging:: Quack flagging\"\n  \
                         < input > $out\n{\n  msname = $msname\n  quackinterval = 30.0\n}"
                    )
                    .unwrap()
                    .0
            );
            Ok(())
        }
        #[test]
        fn test_task_without_specs() -> Result<()> {
            let task = super::task().easy_parse("task setjy: casa_setjy {}").unwrap().0;
            assert_eq!("setjy", task.name);
            assert_eq!("casa_setjy", task.tool);
            assert!(task.specs.is_empty());
            assert!(task.params.is_empty());
            Ok(())
        }
    }
}

mod plan {
    use super::keyword;
    use super::prelude::*;
    use super::rhs::rhs;
    use super::util::{ident, lex, name_ident};
    use crate::ast::{Plan, PlanEntry};

    p! {
        snapshot() -> PlanEntry<'a>, {
            keyword::snapshot()
                .with(lex(rhs()))
                .and(rhs())
                .map(|(src, dst)| PlanEntry::Snapshot { src, dst })
        }
    }

    p! {
        plan_entry() -> PlanEntry<'a>, {
            snapshot().or(ident().map(PlanEntry::Task))
        }
    }

    p! {
        plan() -> Plan<'a>, {
            keyword::plan()
                .with(lex(name_ident()))
                .and(
                    lex(char('{'))
                        .with(many(lex(plan_entry())))
                        .skip(char('}'))
                )
                .map(|(name, entries)| Plan { name, entries })
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;
        use crate::ast::Rhs;
        use combine::EasyParser;
        #[test]
        fn test_plan() {
            assert_eq!(
                Plan {
                    name: "1gc",
                    entries: vec![
                        PlanEntry::Task("quack_flagging"),
                        PlanEntry::Task("snapshot_ms"),
                        PlanEntry::Task("quack_flagging"),
                        PlanEntry::Snapshot {
                            src: Rhs::variable("msname"),
                            dst: Rhs::interp("${prefix}.1GC.MS", vec!["prefix"]),
                        },
                    ],
                },
                plan()
                    .easy_parse(
                        "plan 1gc {\n  quack_flagging\n  snapshot_ms quack_flagging\n  \
                         snapshot $msname \"${prefix}.1GC.MS\"\n}"
                    )
                    .unwrap()
                    .0
            );
        }
        #[test]
        fn test_empty_plan() {
            assert!(plan().easy_parse("plan empty {}").unwrap().0.entries.is_empty());
        }
    }
}

mod recipe {
    use super::assignment::assignments;
    use super::keyword;
    use super::plan::plan;
    use super::prelude::*;
    use super::rhs::rhs;
    use super::task::task;
    use super::util::{lex, tool_ident, whitespace};
    use crate::ast::{Item, Rhs};

    p! {
        tool() -> (&'a str, Rhs<'a>), {
            keyword::tool()
                .with(lex(tool_ident()))
                .skip(lex(char('=')))
                .and(rhs())
        }
    }

    p! {
        item() -> Item<'a>, {
            choice!(
                keyword::global().with(assignments()).map(Item::GlobalConfig),
                keyword::roots().with(assignments()).map(Item::Roots),
                tool().map(|(id, cmd)| Item::Tool(id, cmd)),
                task().map(Item::Task),
                plan().map(Item::Plan)
            )
        }
    }

    p! {
        items() -> Vec<Item<'a>>, {
            optional(whitespace())
                .with(many(lex(item())))
                .skip(eof())
        }
    }
}
