//! Static name lists and uniform pickers
//!
//! The lists are plain data. Every picker draws a uniform index, so the
//! result is always a member of the list it was drawn from.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MASCULINE_NAMES: &[&str] = &[
    "Juan", "Pedro", "Luis", "Carlos", "José", "Miguel", "Rafael", "Francisco",
    "Manuel", "Ramón", "Alberto", "Eduardo", "Héctor", "Julio", "Andrés",
    "Fernando", "Ricardo", "Emmanuel", "Wilson", "Domingo", "Santiago", "Félix",
    "Ángel", "Cristian", "Yefry", "Starlin", "Joel", "Daniel",
];

pub const FEMININE_NAMES: &[&str] = &[
    "María", "Ana", "Carmen", "Rosa", "Juana", "Altagracia", "Mercedes",
    "Yokasta", "Francisca", "Luz", "Esther", "Margarita", "Dulce", "Yesenia",
    "Paola", "Carolina", "Lucía", "Patricia", "Sofía", "Elena", "Isabel",
    "Yajaira", "Milagros", "Rosanna", "Daniela", "Nicole",
];

pub const SURNAMES: &[&str] = &[
    "Pérez", "Rodríguez", "Martínez", "García", "Fernández", "Gómez", "Díaz",
    "Reyes", "Jiménez", "Santos", "Ramírez", "Núñez", "Peña", "Almonte",
    "Batista", "Castillo", "Rosario", "De León", "Guzmán", "Mejía", "Vásquez",
    "Encarnación", "Tavárez", "Cabrera", "Polanco", "Ureña", "Féliz", "Abreu",
];

pub const COMPANY_FRAGMENTS: &[&str] = &[
    "Inversiones", "Distribuidora", "Comercial", "Ferretería", "Agroindustrias",
    "Servicios", "Transporte", "Constructora", "Importadora", "Soluciones",
    "Tecnologías", "Farmacia", "Colmado", "Repuestos", "Textiles",
];

pub const COMPANY_SUFFIXES: &[&str] = &["SRL", "SA", "EIRL", "SAS"];

/// Gender used to choose a first-name list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Masculine,
    Feminine,
}

impl Gender {
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Gender::Masculine
        } else {
            Gender::Feminine
        }
    }

    /// The option label the registration form uses for this gender
    pub fn form_label(&self) -> &'static str {
        match self {
            Gender::Masculine => "Masculino",
            Gender::Feminine => "Femenino",
        }
    }

    pub fn first_names(&self) -> &'static [&'static str] {
        match self {
            Gender::Masculine => MASCULINE_NAMES,
            Gender::Feminine => FEMININE_NAMES,
        }
    }
}

/// Pick one entry uniformly from a static list.
///
/// Every list in this module is non-empty, so the fallback is unreachable
/// for them; it only guards callers passing their own empty slice.
pub fn pick_with<R: Rng + ?Sized>(rng: &mut R, list: &'static [&'static str]) -> &'static str {
    list.choose(rng).copied().unwrap_or_default()
}

pub fn first_name_with<R: Rng + ?Sized>(rng: &mut R, gender: Gender) -> &'static str {
    pick_with(rng, gender.first_names())
}

pub fn masculine_name() -> &'static str {
    pick_with(&mut rand::thread_rng(), MASCULINE_NAMES)
}

pub fn feminine_name() -> &'static str {
    pick_with(&mut rand::thread_rng(), FEMININE_NAMES)
}

pub fn surname() -> &'static str {
    pick_with(&mut rand::thread_rng(), SURNAMES)
}

pub fn company_fragment() -> &'static str {
    pick_with(&mut rand::thread_rng(), COMPANY_FRAGMENTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_lists_are_non_empty() {
        for list in [MASCULINE_NAMES, FEMININE_NAMES, SURNAMES, COMPANY_FRAGMENTS, COMPANY_SUFFIXES] {
            assert!(!list.is_empty());
            assert!(list.iter().all(|s| !s.is_empty()));
        }
    }

    #[test]
    fn test_pickers_return_members() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(MASCULINE_NAMES.contains(&first_name_with(&mut rng, Gender::Masculine)));
            assert!(FEMININE_NAMES.contains(&first_name_with(&mut rng, Gender::Feminine)));
            assert!(SURNAMES.contains(&pick_with(&mut rng, SURNAMES)));
            assert!(COMPANY_FRAGMENTS.contains(&pick_with(&mut rng, COMPANY_FRAGMENTS)));
        }
        assert!(SURNAMES.contains(&surname()));
        assert!(MASCULINE_NAMES.contains(&masculine_name()));
        assert!(FEMININE_NAMES.contains(&feminine_name()));
        assert!(COMPANY_FRAGMENTS.contains(&company_fragment()));
    }

    #[test]
    fn test_pick_from_empty_list_is_empty_string() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_with(&mut rng, &[]), "");
    }

    #[test]
    fn test_gender_serde() {
        let g: Gender = serde_json::from_str("\"feminine\"").unwrap();
        assert_eq!(g, Gender::Feminine);
        assert_eq!(g.form_label(), "Femenino");
    }
}
