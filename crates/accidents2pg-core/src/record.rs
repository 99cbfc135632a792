//! Output record types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vehicle indicator columns, in the order the transform visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vehicle {
    Automovel,
    Bicicleta,
    Caminhao,
    Moto,
    Onibus,
}

impl Vehicle {
    /// Fixed visiting order; determines output order within a row.
    pub const ALL: [Vehicle; 5] = [
        Vehicle::Automovel,
        Vehicle::Bicicleta,
        Vehicle::Caminhao,
        Vehicle::Moto,
        Vehicle::Onibus,
    ];

    /// Column name in the source CSV, also the value stored in `vehicle`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vehicle::Automovel => "automovel",
            Vehicle::Bicicleta => "bicicleta",
            Vehicle::Caminhao => "caminhao",
            Vehicle::Moto => "moto",
            Vehicle::Onibus => "onibus",
        }
    }
}

impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `traffic_accidents` table.
///
/// Field order matches the persisted column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// `data` and `horario` joined by a single space, not reparsed.
    pub created_at: String,
    pub road_name: String,
    pub vehicle: Vehicle,
    pub number_deaths: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_column_name() {
        for vehicle in Vehicle::ALL {
            assert_eq!(vehicle.to_string(), vehicle.as_str());
        }
    }

    #[test]
    fn test_record_serializes_with_table_column_names() {
        let record = NormalizedRecord {
            created_at: "01/01/2023 14:30".to_string(),
            road_name: "BR-116/SP".to_string(),
            vehicle: Vehicle::Moto,
            number_deaths: 2,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["created_at"], "01/01/2023 14:30");
        assert_eq!(value["road_name"], "BR-116/SP");
        assert_eq!(value["vehicle"], "moto");
        assert_eq!(value["number_deaths"], 2);
    }
}
