//! Setup specifications, as submitted by the administrative collaborator.
//! Specs reference catalog entries by name (offices additionally by scope
//! name, candidates by student number); resolution into IDs happens when a
//! spec is loaded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::catalog::{Candidate, Catalog, Office, PoliticalParty, Scope};

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogSpec {
    pub scopes: Vec<ScopeSpec>,
    pub parties: Vec<PartySpec>,
    pub offices: Vec<OfficeSpec>,
    pub candidates: Vec<CandidateSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScopeSpec {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartySpec {
    pub name: String,
    #[serde(default)]
    pub is_renewed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OfficeSpec {
    pub name: String,
    pub description: Option<String>,
    /// Scope name; `None` for a central office.
    pub scope: Option<String>,
    pub to_fill: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub scope: String,
    pub party: Option<String>,
    pub contact: Option<String>,
}

impl CatalogSpec {
    /// Resolve this spec into a catalog with sequentially assigned IDs.
    /// Fails on dangling scope/party names or nonsensical seat counts.
    pub fn into_catalog(self) -> Result<Catalog> {
        let mut catalog = Catalog::default();

        let mut scope_ids = HashMap::new();
        for (i, spec) in self.scopes.into_iter().enumerate() {
            let id = i as u32 + 1;
            if scope_ids.insert(spec.name.clone(), id).is_some() {
                return Err(Error::bad_request(format!(
                    "Duplicate scope name: {}",
                    spec.name
                )));
            }
            catalog.scopes.insert(
                id,
                Scope {
                    id,
                    name: spec.name,
                    description: spec.description,
                },
            );
        }

        let mut party_ids = HashMap::new();
        for (i, spec) in self.parties.into_iter().enumerate() {
            let id = i as u32 + 1;
            if party_ids.insert(spec.name.clone(), id).is_some() {
                return Err(Error::bad_request(format!(
                    "Duplicate party name: {}",
                    spec.name
                )));
            }
            catalog.parties.insert(
                id,
                PoliticalParty {
                    id,
                    name: spec.name,
                    is_renewed: spec.is_renewed,
                },
            );
        }

        for (i, spec) in self.offices.into_iter().enumerate() {
            let id = i as u32 + 1;
            if spec.to_fill == 0 {
                return Err(Error::bad_request(format!(
                    "Office {} must fill at least one seat",
                    spec.name
                )));
            }
            let scope = spec
                .scope
                .map(|name| {
                    scope_ids
                        .get(&name)
                        .copied()
                        .ok_or_else(|| Error::bad_request(format!("No scope named {name}")))
                })
                .transpose()?;
            catalog.offices.insert(
                id,
                Office {
                    id,
                    name: spec.name,
                    description: spec.description,
                    scope,
                    to_fill: spec.to_fill,
                },
            );
        }

        for (i, spec) in self.candidates.into_iter().enumerate() {
            let id = i as u32 + 1;
            let scope = scope_ids
                .get(&spec.scope)
                .copied()
                .ok_or_else(|| Error::bad_request(format!("No scope named {}", spec.scope)))?;
            let party = spec
                .party
                .map(|name| {
                    party_ids
                        .get(&name)
                        .copied()
                        .ok_or_else(|| Error::bad_request(format!("No party named {name}")))
                })
                .transpose()?;
            catalog.candidates.insert(
                id,
                Candidate {
                    id,
                    student_number: spec.student_number,
                    first_name: spec.first_name,
                    last_name: spec.last_name,
                    scope,
                    party,
                    contact: spec.contact,
                },
            );
        }

        Ok(catalog)
    }
}

/// Setup for one election season: the offices contested and the
/// candidacies running for them.
#[derive(Debug, Serialize, Deserialize)]
pub struct SeasonSpec {
    pub academic_year: String,
    pub offered: Vec<OfferedOfficeSpec>,
    pub candidacies: Vec<CandidacySpec>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OfferedOfficeSpec {
    pub office: String,
    #[serde(default)]
    pub scope: Option<String>,
    /// Overrides the office's nominal seat count when set.
    pub seats_to_fill: Option<u16>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CandidacySpec {
    pub student_number: String,
    pub office: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub ballot_number: u16,
    #[serde(default)]
    pub is_disqualified: bool,
    #[serde(default)]
    pub disqualification_reason: Option<String>,
}
