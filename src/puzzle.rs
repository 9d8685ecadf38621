//! Puzzles and the test sets used to verify solutions.
//!
//! A [`Puzzle`] describes an exercise. A [`TestProvider`] turns a puzzle into a
//! [`PuzzleTest`]: an ordered, non-empty list of [`TestSet`]s, whose first element
//! is the puzzle's canonical test set (the one performance is measured on).
//!
//! ```
//! use sic1_ensemble::puzzle::{self, RandomProvider, TestProvider};
//!
//! let puzzle = puzzle::find("Addition").unwrap();
//! let test = RandomProvider::seeded(7).tests_for(puzzle);
//!
//! assert_eq!(test.canonical(), &puzzle.canonical);
//! assert_eq!(test.len(), 1 + puzzle.random_sets);
//! ```

use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::Rng;

/// One (input, expected output) pair a program must satisfy.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct TestSet {
    /// Bytes the program reads from `@IN`, in order.
    pub input: Vec<u8>,
    /// Bytes the program is expected to write to `@OUT`, in order.
    pub output: Vec<u8>
}
impl TestSet {
    /// Creates a test set.
    pub fn new(input: impl Into<Vec<u8>>, output: impl Into<Vec<u8>>) -> Self {
        Self { input: input.into(), output: output.into() }
    }
}

/// Errors from constructing a [`PuzzleTest`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum PuzzleTestErr {
    /// The list of test sets was empty.
    #[error("a puzzle test requires at least one test set")]
    NoTestSets
}

/// An ordered, non-empty list of test sets.
///
/// The first test set is canonical.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PuzzleTest {
    test_sets: Vec<TestSet>
}
impl PuzzleTest {
    /// Creates a puzzle test, failing if there are no test sets.
    pub fn new(test_sets: Vec<TestSet>) -> Result<Self, PuzzleTestErr> {
        match test_sets.is_empty() {
            true  => Err(PuzzleTestErr::NoTestSets),
            false => Ok(Self { test_sets }),
        }
    }
    /// Creates a puzzle test consisting of one test set.
    pub fn single(test_set: TestSet) -> Self {
        Self { test_sets: vec![test_set] }
    }

    /// All test sets, in order.
    pub fn test_sets(&self) -> &[TestSet] {
        &self.test_sets
    }
    /// The canonical (first) test set.
    pub fn canonical(&self) -> &TestSet {
        &self.test_sets[0]
    }
    /// Gets the test set at the given index.
    pub fn get(&self, index: usize) -> Option<&TestSet> {
        self.test_sets.get(index)
    }
    /// The number of test sets. This is never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.test_sets.len()
    }
}
impl std::ops::Index<usize> for PuzzleTest {
    type Output = TestSet;

    fn index(&self, index: usize) -> &Self::Output {
        &self.test_sets[index]
    }
}

/// Generates a random test set for a puzzle.
pub type Generator = fn(&mut StdRng) -> TestSet;

/// A programming exercise.
#[derive(Debug, Clone)]
pub struct Puzzle {
    /// The puzzle's title. Titles are unique within the catalog.
    pub title: String,
    /// A description of the task.
    pub description: String,
    /// The canonical test set. Solutions are scored on this set.
    pub canonical: TestSet,
    /// Number of random test sets run after the canonical one.
    pub random_sets: usize,
    /// Produces random test sets. If `None`, only the canonical test set is used.
    pub generator: Option<Generator>
}

/// Something that produces the test sets for a puzzle.
pub trait TestProvider {
    /// Produces the ordered test sets for the given puzzle.
    ///
    /// The first test set must be the puzzle's canonical test set.
    fn tests_for(&self, puzzle: &Puzzle) -> PuzzleTest;
}

/// Provides only the canonical test set.
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalProvider;
impl TestProvider for CanonicalProvider {
    fn tests_for(&self, puzzle: &Puzzle) -> PuzzleTest {
        PuzzleTest::single(puzzle.canonical.clone())
    }
}

/// Provides the canonical test set followed by randomly generated test sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomProvider {
    /// Seed for the random generator.
    ///
    /// If `None`, every call produces different test sets.
    /// If set, every call produces the same test sets for a given puzzle.
    pub seed: Option<u64>
}
impl RandomProvider {
    /// Creates a provider whose test sets are deterministic.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    fn rng(&self) -> StdRng {
        use rand::SeedableRng;

        match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }
}
impl TestProvider for RandomProvider {
    fn tests_for(&self, puzzle: &Puzzle) -> PuzzleTest {
        let mut test_sets = vec![puzzle.canonical.clone()];
        if let Some(generate) = puzzle.generator {
            let mut rng = self.rng();
            test_sets.extend((0..puzzle.random_sets).map(|_| generate(&mut rng)));
        }
        PuzzleTest { test_sets }
    }
}

/// The built-in puzzles.
///
/// This is created on first access and lives for the rest of the process.
pub fn catalog() -> &'static [Puzzle] {
    static CATALOG: OnceLock<Vec<Puzzle>> = OnceLock::new();

    CATALOG.get_or_init(|| vec![
        Puzzle {
            title: "Echo".to_string(),
            description: "Read each input and write it to the output unchanged.".to_string(),
            canonical: TestSet::new([1, 2, 3, 4, 5], [1, 2, 3, 4, 5]),
            random_sets: 2,
            generator: Some(generate_echo)
        },
        Puzzle {
            title: "Negation".to_string(),
            description: "Read each input and write its negation to the output.".to_string(),
            canonical: TestSet::new([3, 0, 7, 255], [253, 0, 249, 1]),
            random_sets: 2,
            generator: Some(generate_negation)
        },
        Puzzle {
            title: "Addition".to_string(),
            description: "Read two numbers and write their sum to the output. Repeat.".to_string(),
            canonical: TestSet::new([1, 2, 10, 20, 100, 27], [3, 30, 127]),
            random_sets: 2,
            generator: Some(generate_addition)
        },
    ])
}

/// Finds a built-in puzzle by title.
pub fn find(title: &str) -> Option<&'static Puzzle> {
    catalog().iter().find(|p| p.title == title)
}

fn random_bytes(rng: &mut StdRng, count: usize) -> Vec<u8> {
    (0..count).map(|_| rng.gen_range(1..=100)).collect()
}
fn generate_echo(rng: &mut StdRng) -> TestSet {
    let len = rng.gen_range(3..=8);
    let input = random_bytes(rng, len);
    TestSet { output: input.clone(), input }
}
fn generate_negation(rng: &mut StdRng) -> TestSet {
    let len = rng.gen_range(3..=8);
    let input = random_bytes(rng, len);
    TestSet { output: input.iter().map(|b| b.wrapping_neg()).collect(), input }
}
fn generate_addition(rng: &mut StdRng) -> TestSet {
    let pairs = rng.gen_range(2..=5);
    let input = random_bytes(rng, pairs * 2);
    let output = input.chunks(2).map(|p| p[0].wrapping_add(p[1])).collect();
    TestSet { input, output }
}
