//! The input parser stack: Admin, User and Game recognizers, tried in the
//! order determined by session state.
//!
//! No teacher analogue exists for a natural-language command parser;
//! grounded on the dispatch-by-enum shape of `wrldbldr-engine-adapters/
//! src/infrastructure/websocket/dispatch.rs`, generalized here to a chain
//! of recognizers instead of one big match.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use gaia_domain::ObjectId;

use crate::world_cache::WorldCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Admin,
    User,
    Game,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub mode: Mode,
    pub verb: String,
    pub args: String,
    pub raw: String,
    pub resolved_objects: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerOutcome {
    Recognized(Recognition),
    NotRecognized,
    /// Multiple noun candidates survived every tie-breaker; the session
    /// should be asked which one was meant.
    Disambiguate { verb: String, candidates: Vec<ObjectId> },
}

pub struct RecognitionContext<'a> {
    pub actor: ObjectId,
    pub location: ObjectId,
    pub cache: &'a WorldCache,
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, raw_line: &str, ctx: &RecognitionContext<'_>) -> RecognizerOutcome;
}

/// An immutable table swapped atomically on update so recognizers never
/// observe a table mid-mutation during dynamic command registration.
#[derive(Default)]
pub struct CommandTable {
    inner: RwLock<Arc<HashSet<String>>>,
}

impl CommandTable {
    pub fn new(commands: impl IntoIterator<Item = String>) -> Self {
        let set: HashSet<String> = commands.into_iter().map(|c| c.to_lowercase()).collect();
        Self {
            inner: RwLock::new(Arc::new(set)),
        }
    }

    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        self.inner.read().unwrap().clone()
    }

    pub fn register(&self, command: impl Into<String>) {
        let mut guard = self.inner.write().unwrap();
        let mut updated = (**guard).clone();
        updated.insert(command.into().to_lowercase());
        *guard = Arc::new(updated);
    }
}

/// Maps a synonym verb to the canonical verb it should resolve as, e.g.
/// `"get"` -> `"take"` so both `cmd_get` and `cmd_take` are searched. Same
/// snapshot-swap shape as [`CommandTable`].
#[derive(Default)]
pub struct SynonymTable {
    inner: RwLock<Arc<HashMap<String, String>>>,
}

impl SynonymTable {
    pub fn new(synonyms: impl IntoIterator<Item = (String, String)>) -> Self {
        let map: HashMap<String, String> = synonyms
            .into_iter()
            .map(|(synonym, canonical)| (synonym.to_lowercase(), canonical.to_lowercase()))
            .collect();
        Self {
            inner: RwLock::new(Arc::new(map)),
        }
    }

    pub fn snapshot(&self) -> Arc<HashMap<String, String>> {
        self.inner.read().unwrap().clone()
    }

    pub fn register(&self, synonym: impl Into<String>, canonical: impl Into<String>) {
        let mut guard = self.inner.write().unwrap();
        let mut updated = (**guard).clone();
        updated.insert(synonym.into().to_lowercase(), canonical.into().to_lowercase());
        *guard = Arc::new(updated);
    }

    /// The canonical verb `verb` resolves to, if it is a registered synonym.
    pub fn canonical_of(&self, verb: &str) -> Option<String> {
        self.snapshot().get(&verb.to_lowercase()).cloned()
    }
}

/// Requires the line begin with `/`; the first whitespace-separated token
/// after `/` is the command (matched case-insensitively), the rest is
/// passed through as arguments untouched.
pub struct AdminRecognizer {
    pub commands: CommandTable,
}

#[async_trait]
impl Recognizer for AdminRecognizer {
    async fn recognize(&self, raw_line: &str, _ctx: &RecognitionContext<'_>) -> RecognizerOutcome {
        let Some(rest) = raw_line.strip_prefix('/') else {
            return RecognizerOutcome::NotRecognized;
        };
        let mut parts = rest.splitn(2, char::is_whitespace);
        let Some(verb) = parts.next().filter(|v| !v.is_empty()) else {
            return RecognizerOutcome::NotRecognized;
        };
        let args = parts.next().unwrap_or("").trim().to_string();
        let snapshot = self.commands.snapshot();
        if snapshot.contains(&verb.to_lowercase()) {
            RecognizerOutcome::Recognized(Recognition {
                mode: Mode::Admin,
                verb: verb.to_lowercase(),
                args,
                raw: raw_line.to_string(),
                resolved_objects: Vec::new(),
            })
        } else {
            RecognizerOutcome::NotRecognized
        }
    }
}

/// Matches a dynamically registered keyword set (`WHO`, `QUIT`, `CONNECT`,
/// `COMMANDS`, ...) case-insensitively on the keyword; arguments preserved
/// as typed.
pub struct UserRecognizer {
    pub keywords: CommandTable,
}

impl UserRecognizer {
    pub fn with_defaults() -> Self {
        Self {
            keywords: CommandTable::new(
                ["who", "quit", "connect", "commands"].iter().map(|s| s.to_string()),
            ),
        }
    }
}

#[async_trait]
impl Recognizer for UserRecognizer {
    async fn recognize(&self, raw_line: &str, _ctx: &RecognitionContext<'_>) -> RecognizerOutcome {
        let trimmed = raw_line.trim();
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let Some(keyword) = parts.next().filter(|k| !k.is_empty()) else {
            return RecognizerOutcome::NotRecognized;
        };
        let snapshot = self.keywords.snapshot();
        if snapshot.contains(&keyword.to_lowercase()) {
            RecognizerOutcome::Recognized(Recognition {
                mode: Mode::User,
                verb: keyword.to_lowercase(),
                args: parts.next().unwrap_or("").trim().to_string(),
                raw: raw_line.to_string(),
                resolved_objects: Vec::new(),
            })
        } else {
            RecognizerOutcome::NotRecognized
        }
    }
}

/// Natural-language verb-object parser. Verbs and nouns are both matched
/// case-insensitively — a player should not need to remember an object's
/// authored capitalization, and treating verbs any differently from the
/// User/Admin recognizers would be a silent inconsistency.
pub struct GameRecognizer {
    pub verbs: CommandTable,
    recent: Mutex<Vec<ObjectId>>,
}

impl GameRecognizer {
    pub fn new(verbs: CommandTable) -> Self {
        Self {
            verbs,
            recent: Mutex::new(Vec::new()),
        }
    }

    pub fn note_interaction(&self, object: ObjectId) {
        let mut recent = self.recent.lock().unwrap();
        recent.retain(|o| o != &object);
        recent.push(object);
    }

    fn recency_rank(&self, object: &ObjectId) -> usize {
        let recent = self.recent.lock().unwrap();
        recent.iter().rev().position(|o| o == object).unwrap_or(usize::MAX)
    }
}

#[async_trait]
impl Recognizer for GameRecognizer {
    async fn recognize(&self, raw_line: &str, ctx: &RecognitionContext<'_>) -> RecognizerOutcome {
        // Stage 1: lexical cleanup.
        let cleaned = collapse_whitespace(raw_line.trim());
        if cleaned.is_empty() {
            return RecognizerOutcome::NotRecognized;
        }

        // Stage 2/3: split into verb and object phrase; prepositions split
        // direct from indirect object phrases.
        let mut tokens = cleaned.split(' ');
        let Some(verb) = tokens.next() else {
            return RecognizerOutcome::NotRecognized;
        };
        let verb_lower = verb.to_lowercase();
        if !self.verbs.snapshot().contains(&verb_lower) {
            return RecognizerOutcome::NotRecognized;
        }

        let rest: Vec<&str> = tokens.collect();
        let (direct_phrase, _indirect_phrase) = split_on_preposition(&rest);
        let direct_phrase = strip_articles(direct_phrase);

        if direct_phrase.is_empty() {
            return RecognizerOutcome::Recognized(Recognition {
                mode: Mode::Game,
                verb: verb_lower,
                args: rest.join(" "),
                raw: raw_line.to_string(),
                resolved_objects: Vec::new(),
            });
        }

        let phrase = direct_phrase.join(" ");
        match self.resolve_noun_phrase(&phrase, ctx).await {
            Ok(Some(object)) => {
                self.note_interaction(object.clone());
                RecognizerOutcome::Recognized(Recognition {
                    mode: Mode::Game,
                    verb: verb_lower,
                    args: rest.join(" "),
                    raw: raw_line.to_string(),
                    resolved_objects: vec![object],
                })
            }
            Ok(None) => RecognizerOutcome::NotRecognized,
            Err(candidates) => RecognizerOutcome::Disambiguate { verb: verb_lower, candidates },
        }
    }
}

impl GameRecognizer {
    /// Resolves a noun phrase against visible objects: the actor's
    /// inventory and location contents, then the actor itself. Ties are
    /// broken by (a) exact name match over partial, (b) inventory over
    /// room, (c) most recently interacted with, (d) first by object id.
    async fn resolve_noun_phrase(
        &self,
        phrase: &str,
        ctx: &RecognitionContext<'_>,
    ) -> Result<Option<ObjectId>, Vec<ObjectId>> {
        let actor = ctx.cache.get(&ctx.actor).await.ok();
        let location = ctx.cache.get(&ctx.location).await.ok();

        let mut candidates: Vec<(ObjectId, bool /* in_inventory */, bool /* exact */)> = Vec::new();
        let phrase_lower = phrase.to_lowercase();

        if let Some(actor) = &actor {
            for id in &actor.contents {
                if let Ok(obj) = ctx.cache.get(id).await {
                    if name_matches(&obj.display_name, &phrase_lower) {
                        let exact = obj.display_name.to_lowercase() == phrase_lower;
                        candidates.push((id.clone(), true, exact));
                    }
                }
            }
        }
        if let Some(location) = &location {
            for id in &location.contents {
                if id == &ctx.actor {
                    continue;
                }
                if let Ok(obj) = ctx.cache.get(id).await {
                    if name_matches(&obj.display_name, &phrase_lower) {
                        let exact = obj.display_name.to_lowercase() == phrase_lower;
                        candidates.push((id.clone(), false, exact));
                    }
                }
            }
        }
        if let Some(actor) = &actor {
            if name_matches(&actor.display_name, &phrase_lower) {
                let exact = actor.display_name.to_lowercase() == phrase_lower;
                candidates.push((ctx.actor.clone(), true, exact));
            }
        }

        if candidates.is_empty() {
            return Ok(None);
        }
        if candidates.len() == 1 {
            return Ok(Some(candidates[0].0.clone()));
        }

        let has_exact = candidates.iter().any(|(_, _, exact)| *exact);
        if has_exact {
            candidates.retain(|(_, _, exact)| *exact);
        }
        if candidates.len() == 1 {
            return Ok(Some(candidates[0].0.clone()));
        }

        let has_inventory = candidates.iter().any(|(_, in_inventory, _)| *in_inventory);
        if has_inventory {
            candidates.retain(|(_, in_inventory, _)| *in_inventory);
        }
        if candidates.len() == 1 {
            return Ok(Some(candidates[0].0.clone()));
        }

        // Object ids are globally unique, so sorting by (recency, id) and
        // taking the head is always decisive — no further disambiguation.
        candidates.sort_by_key(|(id, _, _)| (self.recency_rank(id), id.clone()));
        Ok(Some(candidates[0].0.clone()))
    }
}

fn name_matches(name: &str, phrase_lower: &str) -> bool {
    let name_lower = name.to_lowercase();
    name_lower == phrase_lower || name_lower.contains(phrase_lower)
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

const PREPOSITIONS: &[&str] = &["in", "on", "at", "with", "to", "from", "under", "into"];
const ARTICLES: &[&str] = &["a", "an", "the"];

fn split_on_preposition<'a>(tokens: &'a [&'a str]) -> (Vec<&'a str>, Vec<&'a str>) {
    if let Some(pos) = tokens.iter().position(|t| PREPOSITIONS.contains(&t.to_lowercase().as_str())) {
        (tokens[..pos].to_vec(), tokens[pos + 1..].to_vec())
    } else {
        (tokens.to_vec(), Vec::new())
    }
}

fn strip_articles(tokens: Vec<&str>) -> Vec<&str> {
    tokens
        .into_iter()
        .filter(|t| !ARTICLES.contains(&t.to_lowercase().as_str()))
        .collect()
}

/// Builds the ordered recognizer stack for a session's current state.
pub fn recognizer_stack<'a>(
    admin: &'a AdminRecognizer,
    user: &'a UserRecognizer,
    game: &'a GameRecognizer,
    is_admin: bool,
    is_embodied: bool,
) -> Vec<&'a (dyn Recognizer + 'a)> {
    match (is_admin, is_embodied) {
        (false, false) => vec![user],
        (false, true) => vec![user, game],
        (true, false) => vec![admin, user],
        (true, true) => vec![admin, user, game],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_requires_leading_slash() {
        let table = CommandTable::new(["shutdown".to_string()]);
        assert!(table.snapshot().contains("shutdown"));
    }

    #[test]
    fn command_table_register_swaps_snapshot_without_mutating_old_one() {
        let table = CommandTable::new(["who".to_string()]);
        let before = table.snapshot();
        table.register("quit");
        let after = table.snapshot();
        assert!(!before.contains("quit"));
        assert!(after.contains("quit"));
    }

    #[tokio::test]
    async fn admin_recognizer_declines_without_slash() {
        let admin = AdminRecognizer {
            commands: CommandTable::new(["who".to_string()]),
        };
        let cache = crate::world_cache::WorldCache::new(Arc::new(crate::test_support::NullStore));
        let ctx = RecognitionContext {
            actor: ObjectId::new("#p"),
            location: ObjectId::new("#r"),
            cache: &cache,
        };
        assert_eq!(admin.recognize("who", &ctx).await, RecognizerOutcome::NotRecognized);
    }

    #[tokio::test]
    async fn user_recognizer_matches_keyword_case_insensitively() {
        let user = UserRecognizer::with_defaults();
        let cache = crate::world_cache::WorldCache::new(Arc::new(crate::test_support::NullStore));
        let ctx = RecognitionContext {
            actor: ObjectId::new("#p"),
            location: ObjectId::new("#r"),
            cache: &cache,
        };
        let outcome = user.recognize("WHO", &ctx).await;
        assert!(matches!(outcome, RecognizerOutcome::Recognized(r) if r.verb == "who"));
    }

    #[test]
    fn recognizer_stack_matches_spec_table() {
        let admin = AdminRecognizer { commands: CommandTable::default() };
        let user = UserRecognizer::with_defaults();
        let game = GameRecognizer::new(CommandTable::default());
        assert_eq!(recognizer_stack(&admin, &user, &game, false, false).len(), 1);
        assert_eq!(recognizer_stack(&admin, &user, &game, false, true).len(), 2);
        assert_eq!(recognizer_stack(&admin, &user, &game, true, false).len(), 2);
        assert_eq!(recognizer_stack(&admin, &user, &game, true, true).len(), 3);
    }
}
