//! Tab completion. Works out what the last token of a partial line is (a
//! command name, a flag, a flag's value or a positional value) and asks the
//! matching source for candidates. Mid-typed input is often invalid, so
//! nothing here fails: an unresolvable line falls back to root commands.
use std::sync::Arc;
use std::time::Duration;

use crate::argument::{Argument, CompletionRequest};
use crate::cache::SuggestionCache;
use crate::command::Command;
use crate::config::ParserConfig;
use crate::issuer::Issuer;
use crate::parser::split_flag;
use crate::registry::CommandRegistry;
use crate::resolver::Resolved;
use crate::tokenizer::{ends_with_separator, quote_if_needed, tokenize};

/// What the token being typed is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// The first token: a root command name.
    Root,
    /// Right after a command: its subcommands or its first positional value.
    Command,
    /// A named argument (`-p`, `--player`).
    Flag,
    /// The value of a named argument.
    NamedValue,
    /// A positional value.
    Positional,
    /// Nothing can follow.
    Nothing,
}

impl ContextKind {
    fn tag(self) -> &'static str {
        match self {
            ContextKind::Root => "root",
            ContextKind::Command => "command",
            ContextKind::Flag => "flag",
            ContextKind::NamedValue => "value",
            ContextKind::Positional => "positional",
            ContextKind::Nothing => "nothing",
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Roots,
    Children(Arc<Command>),
    Flags {
        command: Arc<Command>,
        /// Argument tokens already typed.
        present: Vec<String>,
    },
    Value {
        command: Arc<Command>,
        argument: String,
    },
    Positional {
        command: Arc<Command>,
        slot: usize,
    },
    Nothing,
}

impl Source {
    fn kind(&self) -> ContextKind {
        match self {
            Source::Roots => ContextKind::Root,
            Source::Children(_) => ContextKind::Command,
            Source::Flags { .. } => ContextKind::Flag,
            Source::Value { .. } => ContextKind::NamedValue,
            Source::Positional { .. } => ContextKind::Positional,
            Source::Nothing => ContextKind::Nothing,
        }
    }

    fn command(&self) -> Option<&Arc<Command>> {
        match self {
            Source::Children(command)
            | Source::Flags { command, .. }
            | Source::Value { command, .. }
            | Source::Positional { command, .. } => Some(command),
            Source::Roots | Source::Nothing => None,
        }
    }
}

/// The completion context of a partial line.
#[derive(Debug, Clone)]
pub struct Completion {
    source: Source,
    token_count: usize,
    scope: String,
    prefix: String,
    partial: String,
}

impl Completion {
    fn new(source: Source, token_count: usize, finished: &[String], prefix: String, partial: String) -> Completion {
        let scope = format!("{}|{}|{}", source.kind().tag(), finished.join(" "), prefix);
        Completion {
            source,
            token_count,
            scope,
            prefix,
            partial,
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.source.kind()
    }

    /// The number of tokens including the one being typed.
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Identifies the context for the suggestion cache: the context kind,
    /// the finished tokens and the prefix.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Kept in front of every candidate, e.g. `-p=` while completing the
    /// value of `-p`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The text being completed, without the prefix and quotes.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Unfiltered candidates. `partial` is handed to completion providers,
    /// which may use it to narrow an expensive lookup.
    pub fn candidates(&self, registry: &CommandRegistry, issuer: &dyn Issuer, partial: &str) -> Vec<String> {
        if let Some(command) = self.source.command() {
            if !command.is_permitted(issuer) {
                return Vec::new();
            }
        }

        match &self.source {
            Source::Roots => registry
                .roots()
                .filter(|command| command.is_permitted(issuer))
                .map(|command| command.name().to_owned())
                .collect(),
            Source::Children(command) => {
                let mut candidates: Vec<String> = command
                    .children()
                    .filter(|child| child.is_permitted(issuer))
                    .map(|child| child.name().to_owned())
                    .collect();
                if let Some(arg) = command.schema().positional_at(0) {
                    candidates.extend(complete_value(arg, issuer, command, partial));
                }
                candidates
            }
            Source::Flags { command, present } => flag_candidates(registry.config(), command, present),
            Source::Value { command, argument } => match command.schema().by_short_name(argument) {
                Some(arg) => complete_value(arg, issuer, command, partial),
                None => Vec::new(),
            },
            Source::Positional { command, slot } => match command.schema().positional_at(*slot) {
                Some(arg) => complete_value(arg, issuer, command, partial),
                None => Vec::new(),
            },
            Source::Nothing => Vec::new(),
        }
    }

    /// Filters `candidates` by the partial text and makes them ready to
    /// insert: prefixed and quoted where needed.
    pub fn finish(&self, candidates: Vec<String>) -> Vec<String> {
        candidates
            .into_iter()
            .filter(|candidate| candidate.starts_with(&self.partial))
            .map(|candidate| format!("{}{}", self.prefix, quote_if_needed(&candidate)))
            .collect()
    }
}

fn complete_value(arg: &Argument, issuer: &dyn Issuer, command: &Command, partial: &str) -> Vec<String> {
    arg.complete(&CompletionRequest {
        issuer,
        command,
        partial,
    })
}

fn flag_candidates(config: &ParserConfig, command: &Command, present: &[String]) -> Vec<String> {
    let mut candidates = Vec::new();
    for arg in command.schema().named() {
        let short = arg.short_flag(config.flag_prefix);
        let long = arg.long_flag(config.flag_prefix);
        if arg.is_valueless() {
            let used = present
                .iter()
                .any(|token| *token == short || Some(token) == long.as_ref());
            if used {
                continue;
            }
        }

        let separator = if arg.is_valueless() || config.space_separated {
            String::new()
        } else {
            config.separator.to_string()
        };
        candidates.push(format!("{}{}", short, separator));
        if let Some(long) = long {
            candidates.push(format!("{}{}", long, separator));
        }
    }
    candidates
}

/// Walks the finished argument tokens of `command`. Returns the number of
/// positional values seen and, in space-separated mode, the valued argument
/// still waiting for its value.
fn walk<'a>(config: &ParserConfig, command: &'a Command, args: &[String]) -> (usize, Option<&'a Argument>) {
    let mut slot = 0;
    let mut awaiting = None;
    for token in args {
        if awaiting.take().is_some() {
            continue;
        }

        match split_flag(config, token) {
            Some(flag) if config.space_separated => {
                awaiting = command
                    .schema()
                    .lookup_flag(flag.name, flag.long)
                    .filter(|arg| !arg.is_valueless());
            }
            Some(_) => (),
            None => slot += 1,
        }
    }
    (slot, awaiting)
}

/// Determines the completion context of `input`.
pub fn complete(registry: &CommandRegistry, input: &str) -> Completion {
    let config = registry.config();
    let tokenized = tokenize(input);
    let finished_last = tokenized.is_empty() || ends_with_separator(input, &tokenized);
    let mut tokens = tokenized.tokens;
    if finished_last {
        tokens.push(String::new());
    }

    let token_count = tokens.len();
    let partial = tokens.pop().unwrap_or_default();
    let finished = tokens;
    if finished.is_empty() {
        return Completion::new(Source::Roots, token_count, &finished, String::new(), partial);
    }

    let Resolved { command, index } = match registry.resolve(&finished[..]) {
        Ok(resolved) => resolved,
        Err(err) => {
            trace!("suggest: falling back to root commands: {}", err);
            let first = finished[0].clone();
            return Completion::new(Source::Roots, token_count, &finished, String::new(), first);
        }
    };

    let args = &finished[index + 1..];
    if partial.starts_with(config.flag_prefix) {
        if let Some(flag) = split_flag(config, &partial) {
            if let Some(value) = flag.value {
                let source = match command.schema().lookup_flag(flag.name, flag.long) {
                    Some(arg) if !arg.is_valueless() => Source::Value {
                        command: command.clone(),
                        argument: arg.name().to_owned(),
                    },
                    _ => Source::Nothing,
                };
                let prefix = partial[..partial.len() - value.len()].to_owned();
                return Completion::new(source, token_count, &finished, prefix, value.to_owned());
            }
        }

        let source = Source::Flags {
            command,
            present: args.to_vec(),
        };
        return Completion::new(source, token_count, &finished, String::new(), partial);
    }

    let (slot, awaiting) = walk(config, &command, args);
    let awaiting = awaiting.map(|arg| arg.name().to_owned());
    let source = if let Some(argument) = awaiting {
        Source::Value { command, argument }
    } else if args.is_empty() {
        Source::Children(command)
    } else if command.schema().positional_at(slot).is_some() {
        Source::Positional { command, slot }
    } else {
        Source::Nothing
    };
    Completion::new(source, token_count, &finished, String::new(), partial)
}

/// Suggestions for `input`, computed directly.
pub fn suggest(registry: &CommandRegistry, issuer: &dyn Issuer, input: &str) -> Vec<String> {
    let completion = complete(registry, input);
    let candidates = completion.candidates(registry, issuer, &completion.partial);
    completion.finish(candidates)
}

/// The suggestion engine behind a per-issuer cache.
pub struct Suggester {
    registry: Arc<CommandRegistry>,
    cache: SuggestionCache<String>,
}

impl Suggester {
    pub fn new(registry: Arc<CommandRegistry>) -> Suggester {
        let cache = SuggestionCache::new(registry.config().cache.clone());
        Suggester { registry, cache }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &SuggestionCache<String> {
        &self.cache
    }

    /// Suggestions for `input` typed by `issuer`. Narrows the issuer's
    /// previous list while the same token is being typed.
    pub fn suggest(&self, issuer: &dyn Issuer, input: &str) -> Vec<String> {
        let completion = complete(&self.registry, input);
        let registry = &*self.registry;
        let candidates = self.cache.get_scoped(
            &issuer.name().to_owned(),
            completion.token_count,
            &completion.scope,
            &completion.partial,
            |partial| completion.candidates(registry, issuer, partial),
        );
        completion.finish(candidates)
    }

    /// Like [`suggest`](Self::suggest), but a cache miss is computed on the
    /// worker pool and an empty list is returned meanwhile. Never blocks.
    pub fn suggest_async(&self, issuer: Arc<dyn Issuer>, input: &str) -> Vec<String> {
        let completion = complete(&self.registry, input);
        let key = issuer.name().to_owned();
        let registry = self.registry.clone();
        let deferred = completion.clone();
        let candidates = self.cache.get_async(
            &key,
            completion.token_count,
            &completion.scope,
            &completion.partial,
            move |partial| deferred.candidates(&registry, &*issuer, partial),
        );
        completion.finish(candidates)
    }

    /// Waits for the deferred computation of `issuer`, if any. Returns
    /// `false` on timeout.
    pub fn wait_pending(&self, issuer: &dyn Issuer, timeout: Duration) -> bool {
        self.cache.wait_pending(&issuer.name().to_owned(), timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::{completions, ArgumentConfig, ValueType};
    use crate::command::CommandConfig;
    use crate::config::CacheConfig;
    use crate::issuer::{permissions, ConsoleIssuer, SimpleIssuer};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tree(config: ParserConfig) -> CommandRegistry {
        let mut registry = CommandRegistry::new(config).unwrap();
        registry
            .register(
                CommandConfig::group("bigdoors")
                    .subcommand(
                        CommandConfig::new("addowner")
                            .argument(
                                ArgumentConfig::positional("doorID")
                                    .required()
                                    .completions(completions::fixed(&["front", "back door", "barn"])),
                            )
                            .argument(ArgumentConfig::flag("a").long("admin"))
                            .argument(
                                ArgumentConfig::named("p")
                                    .long("player")
                                    .repeatable()
                                    .completions(completions::fixed(&["pim", "alex", "alice"])),
                            ),
                    )
                    .subcommand(
                        CommandConfig::new("toggle")
                            .argument(ArgumentConfig::positional("state").value_type(ValueType::Boolean)),
                    )
                    .subcommand(CommandConfig::new("admin").permission(permissions::console_only())),
            )
            .unwrap();
        registry.register(CommandConfig::new("bye")).unwrap();
        registry
    }

    fn registry() -> CommandRegistry {
        tree(ParserConfig::default())
    }

    fn run(registry: &CommandRegistry, input: &str) -> Vec<String> {
        suggest(registry, &ConsoleIssuer, input)
    }

    #[test]
    fn contexts() {
        let registry = registry();
        let kind = |input: &str| complete(&registry, input).kind();
        assert_eq!(kind(""), ContextKind::Root);
        assert_eq!(kind("big"), ContextKind::Root);
        assert_eq!(kind("bigdoors "), ContextKind::Command);
        assert_eq!(kind("bigdoors addowner "), ContextKind::Command);
        assert_eq!(kind("bigdoors addowner front -"), ContextKind::Flag);
        assert_eq!(kind("bigdoors addowner front -p=a"), ContextKind::NamedValue);
        assert_eq!(kind("bigdoors addowner front -a=x"), ContextKind::Nothing);
        assert_eq!(kind("bigdoors addowner front "), ContextKind::Nothing);
        assert_eq!(kind("bigdoors toggle "), ContextKind::Command);
        assert_eq!(kind("nope x"), ContextKind::Root);
    }

    #[test]
    fn commands() {
        let registry = registry();
        assert_eq!(run(&registry, ""), vec!["bigdoors", "bye"]);
        assert_eq!(run(&registry, "b"), vec!["bigdoors", "bye"]);
        assert_eq!(run(&registry, "bi"), vec!["bigdoors"]);
        assert_eq!(run(&registry, "bigdoors "), vec!["addowner", "admin", "toggle"]);
        assert_eq!(run(&registry, "bigdoors ad"), vec!["addowner", "admin"]);
        // Falls back to the first token.
        assert_eq!(run(&registry, "by x y"), vec!["bye"]);
    }

    #[test]
    fn permissions_filter_commands() {
        let registry = registry();
        let bob = SimpleIssuer::new("bob");
        assert_eq!(suggest(&registry, &bob, "bigdoors ad"), vec!["addowner"]);
        assert_eq!(suggest(&registry, &bob, "bigdoors admin -"), Vec::<String>::new());
    }

    #[test]
    fn positional_values() {
        let registry = registry();
        assert_eq!(
            run(&registry, "bigdoors addowner "),
            vec!["front", "\"back door\"", "barn"]
        );
        assert_eq!(run(&registry, "bigdoors addowner b"), vec!["\"back door\"", "barn"]);
        assert_eq!(run(&registry, "bigdoors addowner \"back d"), vec!["\"back door\""]);
        assert_eq!(run(&registry, "bigdoors toggle t"), vec!["true"]);
    }

    #[test]
    fn flags() {
        let registry = registry();
        assert_eq!(
            run(&registry, "bigdoors addowner front -"),
            vec!["-a", "--admin", "-h", "--help", "-p=", "--player="]
        );
        assert_eq!(run(&registry, "bigdoors addowner front --p"), vec!["--player="]);
        // Present valueless flags are not offered again.
        assert_eq!(
            run(&registry, "bigdoors addowner front -a -"),
            vec!["-h", "--help", "-p=", "--player="]
        );
        assert_eq!(
            run(&registry, "bigdoors addowner front -p=pim -"),
            vec!["-a", "--admin", "-h", "--help", "-p=", "--player="]
        );
    }

    #[test]
    fn named_values() {
        let registry = registry();
        assert_eq!(
            run(&registry, "bigdoors addowner front -p=al"),
            vec!["-p=alex", "-p=alice"]
        );
        assert_eq!(
            run(&registry, "bigdoors addowner front --player="),
            vec!["--player=pim", "--player=alex", "--player=alice"]
        );
        assert_eq!(run(&registry, "bigdoors addowner front -x=a"), Vec::<String>::new());
    }

    #[test]
    fn space_separated_values() {
        let registry = tree(ParserConfig {
            space_separated: true,
            ..ParserConfig::default()
        });
        assert_eq!(run(&registry, "bigdoors addowner front -p a"), vec!["alex", "alice"]);
        assert_eq!(run(&registry, "bigdoors addowner front --p"), vec!["--player"]);
        // The value of `-p` is not a positional.
        assert_eq!(
            run(&registry, "bigdoors addowner -p pim "),
            vec!["front", "\"back door\"", "barn"]
        );
        assert_eq!(run(&registry, "bigdoors addowner front -a "), Vec::<String>::new());
    }

    fn counting_registry(calls: Arc<AtomicUsize>) -> CommandRegistry {
        let mut registry = CommandRegistry::new(ParserConfig {
            cache: CacheConfig {
                sweep_interval_ms: 0,
                ..CacheConfig::default()
            },
            ..ParserConfig::default()
        })
        .unwrap();
        registry
            .register(
                CommandConfig::new("give").argument(ArgumentConfig::positional("item").completions(Arc::new(
                    move |request: &CompletionRequest| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        ["apple", "apricot", "avocado", "banana"]
                            .iter()
                            .filter(|item| item.starts_with(request.partial))
                            .map(|item| (*item).to_owned())
                            .collect()
                    },
                ))),
            )
            .unwrap();
        registry
    }

    #[test]
    fn cached_suggestions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let suggester = Suggester::new(Arc::new(counting_registry(calls.clone())));
        let direct = counting_registry(Arc::new(AtomicUsize::new(0)));

        for input in &["give a", "give ap", "give apr", "give apri"] {
            assert_eq!(
                suggester.suggest(&ConsoleIssuer, input),
                suggest(&direct, &ConsoleIssuer, input)
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Another issuer has its own entry.
        suggester.suggest(&SimpleIssuer::new("bob"), "give ap");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn deferred_suggestions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let suggester = Suggester::new(Arc::new(counting_registry(calls.clone())));
        let console: Arc<dyn Issuer> = Arc::new(ConsoleIssuer);

        assert_eq!(suggester.suggest_async(console.clone(), "give ap"), Vec::<String>::new());
        assert!(suggester.wait_pending(&*console, Duration::from_secs(5)));
        assert_eq!(suggester.suggest_async(console.clone(), "give apr"), vec!["apricot"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
