//! Human-friendly endpoint name generation

use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "quick", "lazy", "happy", "sad", "bright", "dark", "cool", "warm", "fast", "slow",
    "red", "blue", "green", "bold", "calm", "wild", "soft", "loud", "tiny", "huge",
    "ancient", "autumn", "billowing", "broken", "crimson", "dawn", "falling", "frosty",
    "hidden", "misty", "morning", "polished", "quiet", "silent", "snowy", "twilight",
];

const NOUNS: &[&str] = &[
    "fox", "dog", "cat", "bird", "fish", "bear", "wolf", "deer", "hawk", "owl",
    "tree", "lake", "hill", "rock", "wave", "star", "moon", "sun", "cloud", "rain",
    "breeze", "brook", "dew", "dust", "feather", "field", "fire", "flower", "forest",
    "glade", "meadow", "mountain", "night", "pond", "river", "shadow", "sky", "snow",
];

/// Generate an endpoint name like `misty-river-4821`
pub fn generate_endpoint_name() -> String {
    let mut rng = rand::thread_rng();
    let adj = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let num: u16 = rng.gen_range(1000..10000);

    format!("{}-{}-{}", adj, noun, num)
}
