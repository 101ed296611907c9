//! Deterministic taxpayer name generation using curated name lists.
//!
//! Names are drawn from lists common in The Gambia so generated records
//! read plausibly. All generation is deterministic (same RNG seed =
//! same names).

use crate::rng::StageRng;

pub struct NameGenerator;

impl NameGenerator {
    /// Generate a full personal name (first + last).
    pub fn generate_full_name(rng: &mut StageRng) -> String {
        let first = Self::generate_first_name(rng);
        let last = Self::generate_last_name(rng);
        format!("{} {}", first, last)
    }

    pub fn generate_first_name(rng: &mut StageRng) -> &'static str {
        let names = Self::first_names();
        names[rng.next_u64_below(names.len() as u64) as usize]
    }

    pub fn generate_last_name(rng: &mut StageRng) -> &'static str {
        let names = Self::last_names();
        names[rng.next_u64_below(names.len() as u64) as usize]
    }

    /// Generate a trading name for a corporate or partnership taxpayer.
    /// Format: "Prefix Line Suffix" or "LastName Line Suffix".
    pub fn generate_business_name(rng: &mut StageRng) -> String {
        let prefixes = Self::business_prefixes();
        let lines = Self::business_lines();
        let suffixes = Self::business_suffixes();

        let line = lines[rng.next_u64_below(lines.len() as u64) as usize];
        let suffix = suffixes[rng.next_u64_below(suffixes.len() as u64) as usize];

        if rng.chance(0.5) {
            let prefix = prefixes[rng.next_u64_below(prefixes.len() as u64) as usize];
            format!("{} {} {}", prefix, line, suffix)
        } else {
            format!("{} {} {}", Self::generate_last_name(rng), line, suffix)
        }
    }

    fn first_names() -> &'static [&'static str] {
        &[
            "Lamin", "Ousman", "Modou", "Ebrima", "Alieu", "Momodou", "Bakary",
            "Sulayman", "Abdoulie", "Yankuba", "Kebba", "Saikou", "Alagie", "Malick",
            "Dembo", "Sainey", "Buba", "Omar", "Musa", "Pa", "Sheriff", "Karamo",
            "Fatou", "Awa", "Mariama", "Isatou", "Binta", "Haddy", "Kaddy", "Amie",
            "Jainaba", "Adama", "Sainabou", "Fatoumata", "Ramatoulie", "Ya", "Njemeh",
            "Maimuna", "Sira", "Kumba", "Oumie", "Sona", "Tida", "Nyima",
        ]
    }

    fn last_names() -> &'static [&'static str] {
        &[
            "Jallow", "Ceesay", "Touray", "Camara", "Sanneh", "Bah", "Njie", "Darboe",
            "Jammeh", "Sowe", "Baldeh", "Fatty", "Saidy", "Drammeh", "Colley", "Sanyang",
            "Bojang", "Manneh", "Secka", "Kinteh", "Faal", "Gaye", "Mbye", "Conteh",
            "Sillah", "Dibba", "Badjie", "Kujabi", "Jarju", "Trawally",
        ]
    }

    fn business_prefixes() -> &'static [&'static str] {
        &[
            "Gambia", "Banjul", "Serrekunda", "Atlantic", "Sahel", "Kombo",
            "West Coast", "River", "Unity", "Premier", "Golden", "Crescent",
        ]
    }

    fn business_lines() -> &'static [&'static str] {
        &[
            "Trading", "Enterprises", "Holdings", "Ventures", "Commercial",
            "Distribution", "Supplies", "Logistics", "Investments", "Services",
        ]
    }

    fn business_suffixes() -> &'static [&'static str] {
        &["Ltd", "Co. Ltd", "& Sons", "Group", "Company"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::StageRng;

    #[test]
    fn names_are_deterministic() {
        let mut a = StageRng::new(42, 0);
        let mut b = StageRng::new(42, 0);
        for _ in 0..20 {
            assert_eq!(
                NameGenerator::generate_full_name(&mut a),
                NameGenerator::generate_full_name(&mut b)
            );
        }
    }

    #[test]
    fn business_names_have_a_suffix() {
        let mut rng = StageRng::new(7, 0);
        for _ in 0..50 {
            let name = NameGenerator::generate_business_name(&mut rng);
            let known = NameGenerator::business_suffixes()
                .iter()
                .any(|s| name.ends_with(s));
            assert!(known, "unexpected business name shape: {name}");
        }
    }
}
