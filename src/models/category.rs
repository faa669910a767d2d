//! Ordered categorical dimensions of the waitlist report.
//!
//! Each dimension is a closed enum whose declaration order is its total
//! order. Every variant carries the verbose label used by the upstream
//! report and the short canonical label persisted in processed snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// Defines an ordered category enum with its source and canonical labels.
macro_rules! ordered_category {
    (
        $(#[$meta:meta])*
        $name:ident, $dimension:literal {
            $($variant:ident => ($source:literal, $canonical:literal),)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// All values in canonical order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Dimension name used in messages and column headers.
            pub const DIMENSION: &'static str = $dimension;

            /// Short label persisted in processed snapshots.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $canonical,)+
                }
            }

            /// Verbose label as it appears in the raw report.
            pub fn source_label(&self) -> &'static str {
                match self {
                    $($name::$variant => $source,)+
                }
            }

            /// Recode a raw report label. Unknown labels have no category.
            pub fn from_source_label(label: &str) -> Option<Self> {
                match label.trim() {
                    $($source => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Parse a canonical label.
            pub fn from_label(label: &str) -> Option<Self> {
                match label {
                    $($canonical => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Position in the canonical order.
            pub fn rank(&self) -> usize {
                *self as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, AppError> {
                Self::from_label(s).ok_or_else(|| {
                    AppError::data_format(
                        $dimension,
                        format!("'{s}' is not a known {} category", $dimension),
                    )
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                label.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

ordered_category! {
    /// Patient age band.
    AgeBand, "age" {
        UnderOne => ("< 1 Year", "< 1"),
        OneToFive => ("1-5 Years", "1-5"),
        SixToTen => ("6-10 Years", "6-10"),
        ElevenToSeventeen => ("11-17 Years", "11-17"),
        EighteenToThirtyFour => ("18-34 Years", "18-34"),
        ThirtyFiveToFortyNine => ("35-49 Years", "35-49"),
        FiftyToSixtyFour => ("50-64 Years", "50-64"),
        SixtyFivePlus => ("65 +", "65+"),
    }
}

ordered_category! {
    /// Time already spent on the waitlist.
    WaitingTime, "waiting_time" {
        UnderThirtyDays => ("< 30 Days", "less than 30 days"),
        ThirtyToNinetyDays => ("30 to < 90 Days", "30 to 90 days"),
        NinetyDaysToSixMonths => ("90 Days to < 6 Months", "90 days to 6 months"),
        SixMonthsToOneYear => ("6 Months to < 1 Year", "6 months to 1 year"),
        OneToTwoYears => ("1 Year to < 2 Years", "1 to 2 years"),
        TwoToThreeYears => ("2 Years to < 3 Years", "2 to 3 years"),
        ThreeToFiveYears => ("3 Years to < 5 Years", "3 to 5 years"),
        FivePlusYears => ("5 or More Years", "5+ years"),
    }
}

ordered_category! {
    /// Clinical-priority status, most urgent first.
    PriorityStatus, "status" {
        Status1A => ("Liver Status 1A", "Status 1A"),
        Status1B => ("Liver Status 1B", "Status 1B"),
        Meld35Plus => ("Liver MELD / PELD 35+", "MELD/PELD 35+"),
        Meld30To34 => ("Liver MELD / PELD 30-34", "MELD/PELD 30-34"),
        Meld25To29 => ("Liver MELD / PELD 25-29", "MELD/PELD 25-29"),
        Meld20To24 => ("Liver MELD / PELD 20-24", "MELD/PELD 20-24"),
        Meld15To19 => ("Liver MELD / PELD 15-19", "MELD/PELD 15-19"),
        MeldUnder15 => ("Liver MELD / PELD <15", "MELD/PELD <15"),
        TemporarilyInactive => ("Liver Status 7 (Inactive)", "Temporarily Inactive"),
    }
}
