/// A modifier transforms a resolved value given its call arguments.
pub type ModifierFn = fn(&str, &[String]) -> crate::Result<String>;

/// Fixed table of the modifiers usable after `|` in a placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifierRegistry;

const MODIFIERS: &[(&str, ModifierFn)] = &[
    ("upper", upper),
    ("lower", lower),
    ("trim", trim),
    ("replace", replace),
    ("replace_all", replace_all),
];

impl ModifierRegistry {
    pub fn lookup(&self, name: &str) -> Option<ModifierFn> {
        MODIFIERS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, f)| *f)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        MODIFIERS.iter().map(|(name, _)| *name)
    }
}

fn upper(input: &str, _args: &[String]) -> crate::Result<String> {
    Ok(input.to_uppercase())
}

fn lower(input: &str, _args: &[String]) -> crate::Result<String> {
    Ok(input.to_lowercase())
}

/// No argument trims whitespace; one argument trims that character set.
fn trim(input: &str, args: &[String]) -> crate::Result<String> {
    match args {
        [] => Ok(input.trim().to_owned()),
        [set] => Ok(input.trim_matches(|c| set.contains(c)).to_owned()),
        _ => Err(crate::Error::ModifierArity {
            modifier: "trim",
            expected: "at most one",
            got: args.len(),
        }),
    }
}

fn replace(input: &str, args: &[String]) -> crate::Result<String> {
    let [old, new] = args else {
        return Err(crate::Error::ModifierArity {
            modifier: "replace",
            expected: "exactly two",
            got: args.len(),
        });
    };
    Ok(input.replacen(old.as_str(), new, 1))
}

fn replace_all(input: &str, args: &[String]) -> crate::Result<String> {
    let [old, new] = args else {
        return Err(crate::Error::ModifierArity {
            modifier: "replace_all",
            expected: "exactly two",
            got: args.len(),
        });
    };
    Ok(input.replace(old.as_str(), new))
}
