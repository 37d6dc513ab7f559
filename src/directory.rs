//! Users and vehicles referenced by shipments.
use crate::error::ValidationError;
use crate::types::{Role, UserId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[n(0)]
    pub id: UserId,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub role: Role,
    #[n(4)]
    pub company: Option<String>,
    #[n(5)]
    pub tax_id: Option<String>, // CNPJ or CPF
    #[n(6)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub company: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
}

impl NewUser {
    pub fn new(name: &str, email: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            role,
            company: None,
            tax_id: None,
            phone: None,
        }
    }
    pub fn with_company(mut self, company: &str) -> Self {
        self.company = Some(company.to_string());
        self
    }
    pub fn with_tax_id(mut self, tax_id: &str) -> Self {
        self.tax_id = Some(tax_id.to_string());
        self
    }
    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    /// Trims name, lower-cases email.
    pub(crate) fn normalise(self) -> Result<NewUser, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        let email = self.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        Ok(NewUser {
            name,
            email,
            ..self
        })
    }

    pub(crate) fn into_user(self, id: UserId) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            role: self.role,
            company: self.company,
            tax_id: self.tax_id,
            phone: self.phone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[n(0)]
    pub plate: String, // upper case, unique
    #[n(1)]
    pub model: String,
    #[n(2)]
    pub kind: String, // "Furgão", "Caminhão", ...
    #[n(3)]
    pub capacity: Option<String>,
    #[n(4)]
    pub year: Option<u16>,
    #[n(5)]
    pub active: bool,
}

impl Vehicle {
    pub fn new(plate: &str, model: &str, kind: &str) -> Self {
        Self {
            plate: plate.to_string(),
            model: model.to_string(),
            kind: kind.to_string(),
            capacity: None,
            year: None,
            active: true,
        }
    }
    pub fn with_capacity(mut self, capacity: &str) -> Self {
        self.capacity = Some(capacity.to_string());
        self
    }
    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub(crate) fn normalise(self) -> Result<Vehicle, ValidationError> {
        let plate = self.plate.trim().to_uppercase();
        if plate.is_empty() {
            return Err(ValidationError::MissingField("plate"));
        }
        let model = self.model.trim().to_string();
        if model.is_empty() {
            return Err(ValidationError::MissingField("model"));
        }
        Ok(Vehicle {
            plate,
            model,
            ..self
        })
    }
}
