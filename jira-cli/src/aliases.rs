// ABOUTME: Command alias expansion with positional argument slots and cycle detection
// ABOUTME: Expands user-defined aliases into argv before CLI argument parsing

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::limits::MAX_ALIAS_DEPTH;
use crate::error::ConfigurationError;

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d+|@)").expect("invalid placeholder regex"));

/// Alias body as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AliasExpansion {
    /// Command line, split with shell quoting rules
    Line(String),
    /// Pre-split argument list
    Tokens(Vec<String>),
}

impl fmt::Display for AliasExpansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasExpansion::Line(line) => f.write_str(line),
            AliasExpansion::Tokens(tokens) => f.write_str(&shell_words::join(tokens)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    /// `$N`, 1-based
    Arg(usize),
    /// `$@`
    AllArgs,
}

/// Parsed alias body: a literal verb followed by literal or slot tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub verb: String,
    pub tokens: Vec<Token>,
}

impl CommandTemplate {
    pub fn parse(alias: &str, expansion: &AliasExpansion) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidAlias {
            alias: alias.to_string(),
            reason,
        };

        let words = match expansion {
            AliasExpansion::Line(line) => {
                shell_words::split(line).map_err(|e| invalid(format!("cannot split '{line}': {e}")))?
            }
            AliasExpansion::Tokens(tokens) => tokens.clone(),
        };

        let mut words = words.into_iter();
        let verb = words
            .next()
            .filter(|verb| !verb.trim().is_empty())
            .ok_or_else(|| invalid("expansion is empty".to_string()))?;
        if PLACEHOLDER_REGEX.is_match(&verb) {
            return Err(invalid("the command name cannot be an argument slot".to_string()));
        }

        let tokens = words
            .map(|word| parse_token(&word).map_err(|reason| invalid(reason.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { verb, tokens })
    }

    /// Substitute `args` into the slots; arguments no slot refers to are appended
    pub fn render(&self, alias: &str, args: &[String]) -> Result<Vec<String>, ConfigurationError> {
        let mut argv = vec![self.verb.clone()];
        let mut used = vec![false; args.len()];

        for token in &self.tokens {
            match token {
                Token::Literal(text) => argv.push(text.clone()),
                Token::Arg(index) => {
                    let arg = args.get(index - 1).ok_or_else(|| {
                        ConfigurationError::MissingAliasArgument {
                            alias: alias.to_string(),
                            index: *index,
                        }
                    })?;
                    used[index - 1] = true;
                    argv.push(arg.clone());
                }
                Token::AllArgs => {
                    argv.extend(args.iter().cloned());
                    used.iter_mut().for_each(|u| *u = true);
                }
            }
        }

        argv.extend(
            args.iter()
                .zip(used)
                .filter(|(_, used)| !used)
                .map(|(arg, _)| arg.clone()),
        );
        Ok(argv)
    }
}

fn parse_token(word: &str) -> Result<Token, &'static str> {
    if word == "$@" {
        return Ok(Token::AllArgs);
    }
    if let Some(digits) = word.strip_prefix('$') {
        if let Ok(index) = digits.parse::<usize>() {
            return if (1..=9).contains(&index) && digits.len() == 1 {
                Ok(Token::Arg(index))
            } else {
                Err("argument slots are $1 through $9")
            };
        }
    }
    if PLACEHOLDER_REGEX.is_match(word) {
        return Err("argument slots must be whole arguments, e.g. [\"--assignee\", \"$1\"]");
    }
    Ok(Token::Literal(word.to_string()))
}

/// Result of expanding an alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedCommand {
    pub argv: Vec<String>,
    /// Aliases traversed, outermost first
    pub chain: Vec<String>,
}

pub struct AliasResolver {
    aliases: BTreeMap<String, (AliasExpansion, CommandTemplate)>,
}

impl AliasResolver {
    /// Parse and validate every alias. `builtin_commands` may not be shadowed.
    pub fn new(
        aliases: &BTreeMap<String, AliasExpansion>,
        builtin_commands: &[&str],
    ) -> Result<Self, ConfigurationError> {
        let mut parsed = BTreeMap::new();
        for (name, expansion) in aliases {
            if builtin_commands.contains(&name.as_str()) {
                return Err(ConfigurationError::InvalidAlias {
                    alias: name.clone(),
                    reason: "it shadows a built-in command".to_string(),
                });
            }
            let template = CommandTemplate::parse(name, expansion)?;
            parsed.insert(name.clone(), (expansion.clone(), template));
        }

        let resolver = Self { aliases: parsed };
        resolver.check_cycles()?;
        Ok(resolver)
    }

    /// Each alias points at most at one other alias (its verb), so following
    /// verbs from every alias finds any cycle
    fn check_cycles(&self) -> Result<(), ConfigurationError> {
        for start in self.aliases.keys() {
            let mut chain = vec![start.clone()];
            let mut current = start;
            while let Some((_, template)) = self.aliases.get(current) {
                let next = &template.verb;
                if !self.aliases.contains_key(next) {
                    break;
                }
                if chain.contains(next) {
                    chain.push(next.clone());
                    return Err(ConfigurationError::AliasCycle { chain });
                }
                chain.push(next.clone());
                current = next;
            }
        }
        Ok(())
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn template(&self, name: &str) -> Option<&CommandTemplate> {
        self.aliases.get(name).map(|(_, template)| template)
    }

    /// Alias names with their definitions, sorted by name
    pub fn definitions(&self) -> impl Iterator<Item = (&str, &AliasExpansion)> {
        self.aliases
            .iter()
            .map(|(name, (expansion, _))| (name.as_str(), expansion))
    }

    pub fn expand(&self, alias: &str, args: &[String]) -> Result<ExpandedCommand, ConfigurationError> {
        let template = self
            .template(alias)
            .ok_or_else(|| ConfigurationError::UnknownAlias(alias.to_string()))?;

        let mut chain = vec![alias.to_string()];
        let mut argv = template.render(alias, args)?;

        while self.is_alias(&argv[0]) {
            let next = argv[0].clone();
            if chain.contains(&next) || chain.len() >= MAX_ALIAS_DEPTH {
                chain.push(next);
                return Err(ConfigurationError::AliasCycle { chain });
            }
            let template = self
                .template(&next)
                .ok_or_else(|| ConfigurationError::UnknownAlias(next.clone()))?;
            argv = template.render(&next, &argv[1..])?;
            chain.push(next);
        }

        debug!("Expanded alias chain {} into {:?}", chain.join(" -> "), argv);
        Ok(ExpandedCommand { argv, chain })
    }

    /// Expand `argv[1]` when it names an alias; anything else passes through untouched
    pub fn expand_argv(&self, argv: Vec<String>) -> Result<Vec<String>, ConfigurationError> {
        match argv.get(1) {
            Some(command) if self.is_alias(command) => {
                let expanded = self.expand(command, &argv[2..])?;
                let mut result = Vec::with_capacity(expanded.argv.len() + 1);
                result.push(argv[0].clone());
                result.extend(expanded.argv);
                Ok(result)
            }
            _ => Ok(argv),
        }
    }
}
