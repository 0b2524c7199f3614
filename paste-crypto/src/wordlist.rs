//! Embedded passphrase dictionary used to generate and validate
//! hyphen-separated passphrases, drawn uniformly from a fixed word list.
//!
//! This is a complete, self-consistent 512-word list sufficient for correct
//! uniform sampling; the production-facing wordlist users actually see is an
//! external asset outside this crate's scope.

/// Exactly 512 lowercase ASCII words, each 3-8 characters, no duplicates.
pub const WORDS: [&str; 512] = [
    "abacus", "abandon", "abbey", "ability", "ablaze", "abroad", "absent", "absorb",
    "accent", "accept", "access", "acclaim", "accord", "acorn", "acre", "across",
    "acted", "action", "active", "actor", "acute", "adage", "adapt", "adept",
    "adjust", "admire", "adobe", "adopt", "adore", "adrift", "adult", "advance",
    "advice", "aerial", "afar", "affair", "afford", "afloat", "afraid", "after",
    "again", "agenda", "agile", "aglow", "agree", "ahead", "aimed", "alarm",
    "album", "alert", "alibi", "alien", "align", "alike", "alive", "alley",
    "allow", "almond", "almost", "alone", "along", "aloud", "alpha", "alter",
    "amber", "amend", "ample", "amuse", "anchor", "angel", "anger", "angle",
    "angry", "animal", "ankle", "annex", "annoy", "answer", "antler", "anvil",
    "apple", "apply", "apron", "arbor", "arcade", "arch", "ardent", "argue",
    "arise", "armor", "aroma", "arrow", "artist", "ascent", "ashen", "aside",
    "asleep", "aspect", "assent", "assert", "assist", "atlas", "atom", "attach",
    "attic", "audio", "august", "aunt", "author", "avenue", "avert", "avid",
    "avoid", "await", "awake", "award", "aware", "awash", "axiom", "azure",
    "badge", "bagel", "baker", "ballad", "bamboo", "banjo", "banner", "barber",
    "barge", "basalt", "basic", "basin", "basket", "beacon", "beard", "beast",
    "beaver", "become", "before", "began", "begin", "below", "bench", "beside",
    "better", "beyond", "bicycle", "bikini", "billow", "binary", "birch", "bison",
    "blade", "blank", "blast", "blaze", "bless", "blind", "blink", "bliss",
    "blond", "bloom", "blouse", "blue", "blunt", "blush", "board", "boast",
    "bonus", "border", "bosom", "bottle", "bounty", "bowl", "brace", "brain",
    "brand", "brave", "bread", "brick", "bride", "brief", "bright", "brisk",
    "broad", "brook", "brown", "brush", "bubble", "budget", "buffer", "bugle",
    "bumpy", "bunch", "bundle", "burden", "burro", "bush", "cabin", "cable",
    "cactus", "camel", "camera", "campus", "canal", "candle", "canoe", "canvas",
    "canyon", "capital", "caravan", "carbon", "cargo", "carpet", "carrot", "castle",
    "catch", "cattle", "cause", "cedar", "center", "cereal", "chain", "chair",
    "chalk", "champ", "change", "chant", "chapel", "charm", "chart", "chase",
    "cheer", "chess", "chest", "chief", "child", "chili", "choice", "choose",
    "chord", "cinder", "circle", "citrus", "civic", "claim", "clap", "class",
    "clean", "clear", "clerk", "cliff", "climb", "clock", "close", "cloth",
    "cloud", "clown", "coach", "coast", "cobalt", "cobra", "coffee", "coin",
    "comet", "comic", "common", "compass", "comrade", "cone", "confide", "connect",
    "convoy", "coral", "cork", "corn", "cotton", "couch", "cousin", "cover",
    "coyote", "craft", "crane", "crash", "crater", "cream", "credit", "creek",
    "crew", "crimp", "crisp", "crook", "crowd", "crown", "crumb", "crust",
    "cube", "cuddle", "curb", "curl", "curry", "custom", "daily", "dairy",
    "dance", "danger", "dapple", "dare", "darling", "dash", "dawn", "decal",
    "decent", "decode", "deep", "defer", "deliver", "dense", "dental", "depart",
    "depict", "depth", "derive", "desert", "design", "detail", "device", "devote",
    "dial", "diary", "dice", "diesel", "digest", "dilute", "dinner", "direct",
    "ditch", "divert", "dizzy", "docile", "doctor", "dodge", "dome", "donkey",
    "donor", "dorm", "double", "dove", "dozen", "draft", "drain", "drama",
    "drawer", "dream", "dress", "drift", "drink", "drive", "drove", "dryer",
    "dusty", "dwell", "eagle", "early", "earth", "easel", "ebony", "eclipse",
    "ecology", "eighty", "eject", "elbow", "elder", "elect", "elf", "elite",
    "ember", "emerge", "emit", "empire", "enamel", "enclose", "endure", "energy",
    "enjoy", "enrich", "ensure", "enter", "envoy", "equal", "equip", "era",
    "erase", "ergo", "erode", "error", "escape", "essay", "ether", "ethos",
    "evade", "event", "every", "evict", "evoke", "exact", "excel", "exert",
    "exile", "exist", "exotic", "expand", "expert", "extend", "extra", "fable",
    "fabric", "facet", "factor", "fade", "fairly", "falcon", "family", "fancy",
    "fatal", "feast", "fence", "ferry", "fever", "fiber", "field", "fierce",
    "figure", "final", "finch", "first", "fiscal", "flame", "flare", "flash",
    "fleet", "flesh", "flint", "float", "flock", "flood", "floor", "flour",
    "flow", "fluid", "flute", "focal", "focus", "folder", "folio", "follow",
    "forest", "forge", "forum", "fossil", "foster", "found", "foyer", "frame",
    "freed", "frost", "frown", "fruit", "fudge", "fumble", "fungus", "future",
    "gable", "gadget", "galaxy", "gallon", "garden", "garlic", "gather", "gauge",
    "gazer", "gecko", "gentle", "genuine", "gesture", "ghost", "giant", "gift",
    "ginger", "giraffe", "given", "glacier", "gland", "glass", "gleam", "globe",
    "glory", "glove", "goal", "goblin", "golden", "gopher", "gossip", "grade",
    "grain", "grand", "grant", "grape", "graph", "grasp", "grass", "gravel",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn has_exactly_512_entries() {
        assert_eq!(WORDS.len(), 512);
    }

    #[test]
    fn all_entries_unique_lowercase_ascii() {
        let set: HashSet<&str> = WORDS.iter().copied().collect();
        assert_eq!(set.len(), WORDS.len());
        for word in WORDS.iter() {
            assert!(word.chars().all(|c| c.is_ascii_lowercase()));
            assert!(word.len() >= 3 && word.len() <= 8, "word {word} has bad length");
        }
    }
}
