//! Launcher card catalogue and search

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::events::{EventBus, SEARCH_CLEARED, SEARCH_UPDATED};
use crate::state::Observable;

/// Static content card that opens in its own window
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub content: String,
}

impl Card {
    pub fn new(id: u32, title: &str, description: &str, icon: &str, color: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            content: format!("<h2>{}</h2><p>{}</p>", title, description),
        }
    }

    fn haystack(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

/// Built-in launcher cards
pub fn default_cards() -> Vec<Card> {
    vec![
        Card::new(1, "Angular", "A platform for building mobile and desktop web applications with TypeScript.", "🅰️", "#dd0031"),
        Card::new(2, "Rsbuild", "A high-performance build tool based on Rspack, written in Rust.", "🚀", "#4776e6"),
        Card::new(3, "Bun", "All-in-one JavaScript runtime, package manager, and build tool.", "🟡", "#fbf0df"),
        Card::new(4, "TypeScript", "Typed superset of JavaScript that compiles to plain JavaScript.", "🔷", "#3178c6"),
        Card::new(5, "WebUI", "Build modern web-based desktop applications using web technologies.", "🖥️", "#764ba2"),
        Card::new(6, "esbuild", "An extremely fast JavaScript bundler written in Go.", "📦", "#ffcd00"),
        Card::new(7, "Vite", "Next generation frontend tooling with instant server start.", "⚡", "#646cff"),
        Card::new(8, "React", "A JavaScript library for building user interfaces.", "⚛️", "#61dafb"),
        Card::new(9, "Vue", "Progressive JavaScript framework for building UIs.", "💚", "#42b883"),
        Card::new(10, "Svelte", "Cybernetically enhanced web apps with compiler approach.", "🔥", "#ff3e00"),
        Card::new(11, "Rust", "Fast, reliable, and memory-safe systems programming language.", "🦀", "#dea584"),
        Card::new(12, "Tailwind CSS", "A utility-first CSS framework for rapid UI development.", "💨", "#06b6d4"),
    ]
}

/// Card list with a search query
pub struct CardCatalog {
    bus: Arc<EventBus>,
    cards: Vec<Card>,
    query: Observable<String>,
}

impl CardCatalog {
    pub fn new(bus: Arc<EventBus>, cards: Vec<Card>) -> Self {
        Self {
            bus,
            cards,
            query: Observable::new(String::new()),
        }
    }

    pub fn with_defaults(bus: Arc<EventBus>) -> Self {
        Self::new(bus, default_cards())
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn get(&self, id: u32) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn query(&self) -> String {
        self.query.get()
    }

    /// Set the query, publish `search:updated` and return the matches
    pub fn search(&self, query: &str) -> Vec<Card> {
        debug!(%query, "CardCatalog::search: called");
        self.query.set(query.to_string());
        self.bus
            .publish(SEARCH_UPDATED, json!({"query": query, "length": query.chars().count()}));
        self.filtered()
    }

    pub fn clear_search(&self) {
        self.query.set(String::new());
        self.bus
            .publish(SEARCH_CLEARED, json!({"timestamp": Utc::now().timestamp_millis()}));
    }

    /// Cards matching the current query; everything when the query is blank
    pub fn filtered(&self) -> Vec<Card> {
        let needle = self.query.with(|q| q.trim().to_lowercase());
        if needle.is_empty() {
            return self.cards.clone();
        }
        self.cards.iter().filter(|c| c.haystack().contains(&needle)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> (CardCatalog, Arc<EventBus>) {
        let bus = Arc::new(EventBus::default());
        (CardCatalog::with_defaults(bus.clone()), bus)
    }

    #[test]
    fn test_default_cards_have_unique_ids() {
        let cards = default_cards();
        let mut ids: Vec<u32> = cards.iter().map(|c| c.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 12);
        assert_eq!(cards[0].content, format!("<h2>Angular</h2><p>{}</p>", cards[0].description));
    }

    #[test]
    fn test_search_matches_title_and_description() {
        let (catalog, _) = catalog();
        let titles: Vec<String> = catalog.search("  RUST ").into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Rsbuild".to_string(), "Rust".to_string()]);
    }

    #[test]
    fn test_search_publishes_query() {
        let (catalog, bus) = catalog();
        catalog.search("vue");
        let event = bus.get_last(SEARCH_UPDATED).unwrap();
        assert_eq!(event.payload["query"], "vue");
        assert_eq!(event.payload["length"], 3);
    }

    #[test]
    fn test_clear_search_returns_everything() {
        let (catalog, bus) = catalog();
        assert_eq!(catalog.search("zzz-no-match").len(), 0);
        catalog.clear_search();
        assert_eq!(catalog.filtered().len(), 12);
        assert!(bus.get_last(SEARCH_CLEARED).is_some());
    }
}
