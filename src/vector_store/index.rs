use crate::models::Document;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One embedded document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub document: Document,
    pub vector: Vec<f32>,
}

/// Exact nearest-neighbour index over cosine similarity (brute force, O(n) per query)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Add a document; the first vector fixes the dimension of an empty index
    pub fn add(&mut self, document: Document, vector: Vec<f32>) -> Result<()> {
        if self.dimension == 0 && self.entries.is_empty() {
            self.dimension = vector.len();
        }
        anyhow::ensure!(
            vector.len() == self.dimension,
            "Invalid vector dimension: expected {}, got {}",
            self.dimension,
            vector.len()
        );

        self.entries.push(IndexEntry {
            id: document.id(),
            document,
            vector,
        });
        Ok(())
    }

    /// Search for k nearest neighbors using cosine similarity
    /// Returns (entry position, score) sorted by score descending
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        anyhow::ensure!(
            query.len() == self.dimension,
            "Invalid query dimension: expected {}, got {}",
            self.dimension,
            query.len()
        );

        let mut scores: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.vector)))
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores.truncate(k);
        Ok(scores)
    }

    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
