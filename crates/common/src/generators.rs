//! Random sample data for form fields
//!
//! Identifiers are built from the digit generator, which only ever emits
//! `1..=9`. Forms in the application reject identifiers with a leading zero,
//! so zero is excluded from every position, not just the first.
//!
//! Nothing here guarantees uniqueness. Two calls may return the same value.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::names::{self, Gender, COMPANY_FRAGMENTS, COMPANY_SUFFIXES, SURNAMES};

/// Length of a Dominican cédula
pub const CEDULA_LEN: usize = 11;

/// Length of an RNC (company taxpayer number)
pub const RNC_LEN: usize = 9;

/// Digits following the letter prefix of a passport number
pub const PASSPORT_DIGITS: usize = 7;

/// Area codes accepted by the phone inputs
pub const AREA_CODES: &[&str] = &["809", "829", "849"];

pub const DEFAULT_EMAIL_DOMAIN: &str = "mailinator.com";

/// `n` digits drawn from `rng`, each in `1..=9`; zero never appears
pub fn random_digits_with<R: Rng + ?Sized>(rng: &mut R, n: usize) -> String {
    (0..n)
        .map(|_| char::from(b'0' + rng.gen_range(1..=9u8)))
        .collect()
}

/// `n` pseudo-random digits in `1..=9`, no separators
pub fn random_digits(n: usize) -> String {
    random_digits_with(&mut rand::thread_rng(), n)
}

/// Two uppercase ASCII letters drawn from `rng`
pub fn random_letter_pair_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..2)
        .map(|_| char::from(b'A' + rng.gen_range(0..26u8)))
        .collect()
}

/// Two uppercase ASCII letters
pub fn random_letter_pair() -> String {
    random_letter_pair_with(&mut rand::thread_rng())
}

/// Eleven-digit national identity number
pub fn cedula_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    random_digits_with(rng, CEDULA_LEN)
}

/// [`cedula_with`] on the thread rng
pub fn cedula() -> String {
    cedula_with(&mut rand::thread_rng())
}

/// Letter pair followed by seven digits
pub fn passport_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut passport = random_letter_pair_with(rng);
    passport.push_str(&random_digits_with(rng, PASSPORT_DIGITS));
    passport
}

pub fn passport() -> String {
    passport_with(&mut rand::thread_rng())
}

/// Ten-digit local number behind one of the [`AREA_CODES`]
pub fn phone_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let area = names::pick_with(rng, AREA_CODES);
    format!("{}{}", area, random_digits_with(rng, 7))
}

pub fn phone() -> String {
    phone_with(&mut rand::thread_rng())
}

/// Nine-digit taxpayer number for companies
pub fn rnc_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    random_digits_with(rng, RNC_LEN)
}

/// Fold a display name into something an email input accepts.
fn ascii_fold(name: &str) -> String {
    name.chars()
        .filter_map(|c| {
            let folded = match c {
                'á' | 'Á' => 'a',
                'é' | 'É' => 'e',
                'í' | 'Í' => 'i',
                'ó' | 'Ó' => 'o',
                'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
                'ñ' | 'Ñ' => 'n',
                c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
                _ => return None,
            };
            Some(folded)
        })
        .collect()
}

/// ASCII-folded, lowercased `name` followed by four digits.
///
/// Names with nothing left after folding fall back to `socio`.
pub fn email_local_part_with<R: Rng + ?Sized>(rng: &mut R, name: &str) -> String {
    let mut local = ascii_fold(name);
    if local.is_empty() {
        local.push_str("socio");
    }
    local.push_str(&random_digits_with(rng, 4));
    local
}

pub fn email_local_part(name: &str) -> String {
    email_local_part_with(&mut rand::thread_rng(), name)
}

/// [`email_local_part_with`] joined to `domain`
pub fn email_with<R: Rng + ?Sized>(rng: &mut R, name: &str, domain: &str) -> String {
    format!("{}@{}", email_local_part_with(rng, name), domain)
}

pub fn email(name: &str, domain: &str) -> String {
    email_with(&mut rand::thread_rng(), name, domain)
}

/// Sample data for registering one natural person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSeed {
    pub gender: Gender,
    pub cedula: String,
    pub nombre: String,
    pub apellido: String,
    pub segundo_apellido: String,
    pub telefono: String,
    pub celular: String,
    pub email: String,
    pub pasaporte: String,
}

impl PersonaSeed {
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, gender: Gender) -> Self {
        let nombre = names::first_name_with(rng, gender).to_string();
        let apellido = names::pick_with(rng, SURNAMES).to_string();
        let segundo_apellido = names::pick_with(rng, SURNAMES).to_string();
        Self {
            gender,
            cedula: cedula_with(rng),
            telefono: phone_with(rng),
            celular: phone_with(rng),
            email: email_with(rng, &nombre, DEFAULT_EMAIL_DOMAIN),
            pasaporte: passport_with(rng),
            nombre,
            apellido,
            segundo_apellido,
        }
    }

    pub fn generate(gender: Gender) -> Self {
        Self::generate_with(&mut rand::thread_rng(), gender)
    }

    pub fn full_name(&self) -> String {
        format!("{} {} {}", self.nombre, self.apellido, self.segundo_apellido)
    }
}

/// Sample data for registering one legal person (company)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySeed {
    pub nombre: String,
    pub rnc: String,
    pub telefono: String,
    pub email: String,
}

impl CompanySeed {
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let fragment = names::pick_with(rng, COMPANY_FRAGMENTS);
        let surname = names::pick_with(rng, SURNAMES);
        let suffix = names::pick_with(rng, COMPANY_SUFFIXES);
        let nombre = format!("{} {} {}", fragment, surname, suffix);
        Self {
            rnc: rnc_with(rng),
            telefono: phone_with(rng),
            email: email_with(rng, fragment, DEFAULT_EMAIL_DOMAIN),
            nombre,
        }
    }

    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    #[test]
    fn test_digits_length_and_range() {
        let mut rng = rng();
        for n in 0..40 {
            let digits = random_digits_with(&mut rng, n);
            assert_eq!(digits.len(), n);
            assert!(digits.chars().all(|c| ('1'..='9').contains(&c)), "{digits}");
        }
        assert_eq!(random_digits(0), "");
    }

    #[test]
    fn test_digits_never_zero_over_many_draws() {
        let mut rng = rng();
        let digits = random_digits_with(&mut rng, 10_000);
        assert!(!digits.contains('0'));
        // every non-zero digit shows up in a draw this large
        for d in '1'..='9' {
            assert!(digits.contains(d), "digit {d} never drawn");
        }
    }

    #[test]
    fn test_letter_pair() {
        let mut rng = rng();
        for _ in 0..500 {
            let pair = random_letter_pair_with(&mut rng);
            assert_eq!(pair.len(), 2);
            assert!(pair.chars().all(|c| c.is_ascii_uppercase()));
        }
        assert_eq!(random_letter_pair().len(), 2);
    }

    #[test]
    fn test_identifier_shapes() {
        let mut rng = rng();
        assert_eq!(cedula_with(&mut rng).len(), CEDULA_LEN);
        assert_eq!(cedula().len(), CEDULA_LEN);

        let passport = passport_with(&mut rng);
        assert_eq!(passport.len(), 2 + PASSPORT_DIGITS);
        assert!(passport[..2].chars().all(|c| c.is_ascii_uppercase()));
        assert!(passport[2..].chars().all(|c| ('1'..='9').contains(&c)));

        let phone = phone_with(&mut rng);
        assert_eq!(phone.len(), 10);
        assert!(AREA_CODES.contains(&&phone[..3]));
    }

    #[test]
    fn test_email_local_part_folds_accents() {
        let mut rng = rng();
        let local = email_local_part_with(&mut rng, "Ramón De León");
        assert!(local.starts_with("ramondeleon"));
        assert_eq!(local.len(), "ramondeleon".len() + 4);

        let email = email_with(&mut rng, "Ñoño", "example.com");
        assert!(email.starts_with("nono"));
        assert!(email.ends_with("@example.com"));

        assert!(email_local_part_with(&mut rng, "!!").starts_with("socio"));
    }

    #[test]
    fn test_persona_seed_uses_gendered_list() {
        let mut rng = rng();
        let seed = PersonaSeed::generate_with(&mut rng, Gender::Feminine);
        assert!(names::FEMININE_NAMES.contains(&seed.nombre.as_str()));
        assert!(SURNAMES.contains(&seed.apellido.as_str()));
        assert_eq!(seed.cedula.len(), CEDULA_LEN);
        assert!(seed.email.ends_with(DEFAULT_EMAIL_DOMAIN));
        assert!(seed.full_name().starts_with(&seed.nombre));
    }

    #[test]
    fn test_company_seed() {
        let mut rng = rng();
        let seed = CompanySeed::generate_with(&mut rng);
        assert_eq!(seed.rnc.len(), RNC_LEN);
        assert!(COMPANY_SUFFIXES.iter().any(|s| seed.nombre.ends_with(s)));
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = PersonaSeed::generate_with(&mut StdRng::seed_from_u64(42), Gender::Masculine);
        let b = PersonaSeed::generate_with(&mut StdRng::seed_from_u64(42), Gender::Masculine);
        assert_eq!(a, b);
    }
}
