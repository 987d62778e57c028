#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DtypeError {
    #[error("unrecognised weight dtype: {0}")]
    UnknownWeightDtype(String),

    #[error("unrecognised KV cache dtype: {0}")]
    UnknownKvDtype(String),
}

/// Numeric representation of model weights.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightDtype {
    Fp32,
    Fp16,
    Bf16,
    Q8,
    Q4,
}

impl WeightDtype {
    /// Bytes each parameter occupies. Sub-byte quantizations are fractional.
    #[inline]
    pub const fn bytes_per_param(self) -> f64 {
        match self {
            Self::Fp32 => 4.0,
            Self::Fp16 | Self::Bf16 => 2.0,
            Self::Q8 => 1.0,
            Self::Q4 => 0.5,
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fp32 => "fp32",
            Self::Fp16 => "fp16",
            Self::Bf16 => "bf16",
            Self::Q8 => "q8",
            Self::Q4 => "q4",
        }
    }

    pub const ALL: [WeightDtype; 5] = [Self::Fp32, Self::Fp16, Self::Bf16, Self::Q8, Self::Q4];
}

impl std::str::FromStr for WeightDtype {
    type Err = DtypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fp32" => Ok(Self::Fp32),
            "fp16" => Ok(Self::Fp16),
            "bf16" => Ok(Self::Bf16),
            "q8" => Ok(Self::Q8),
            "q4" => Ok(Self::Q4),
            other => Err(DtypeError::UnknownWeightDtype(other.to_owned())),
        }
    }
}

impl std::fmt::Display for WeightDtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Numeric representation of KV cache elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvDtype {
    Fp16,
    Bf16,
    Fp8,
    Int8,
}

impl KvDtype {
    #[inline]
    pub const fn bytes_per_elem(self) -> f64 {
        match self {
            Self::Fp16 | Self::Bf16 => 2.0,
            Self::Fp8 | Self::Int8 => 1.0,
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fp16 => "fp16",
            Self::Bf16 => "bf16",
            Self::Fp8 => "fp8",
            Self::Int8 => "int8",
        }
    }

    pub const ALL: [KvDtype; 4] = [Self::Fp16, Self::Bf16, Self::Fp8, Self::Int8];
}

impl std::str::FromStr for KvDtype {
    type Err = DtypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fp16" => Ok(Self::Fp16),
            "bf16" => Ok(Self::Bf16),
            "fp8" => Ok(Self::Fp8),
            "int8" => Ok(Self::Int8),
            other => Err(DtypeError::UnknownKvDtype(other.to_owned())),
        }
    }
}

impl std::fmt::Display for KvDtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_param_is_positive() {
        for dtype in WeightDtype::ALL {
            assert!(
                dtype.bytes_per_param() > 0.0,
                "{dtype:?} produced non-positive bytes/param"
            );
        }
    }

    #[test]
    fn half_precision_weights_are_two_bytes() {
        assert_eq!(WeightDtype::Fp16.bytes_per_param(), 2.0);
        assert_eq!(WeightDtype::Bf16.bytes_per_param(), 2.0);
        assert_eq!(WeightDtype::Fp32.bytes_per_param(), 4.0);
        assert_eq!(WeightDtype::Q8.bytes_per_param(), 1.0);
        assert_eq!(WeightDtype::Q4.bytes_per_param(), 0.5);
    }

    #[test]
    fn eight_bit_kv_is_half_of_fp16() {
        assert_eq!(
            KvDtype::Fp8.bytes_per_elem(),
            KvDtype::Fp16.bytes_per_elem() / 2.0
        );
        assert_eq!(
            KvDtype::Int8.bytes_per_elem(),
            KvDtype::Bf16.bytes_per_elem() / 2.0
        );
    }

    #[test]
    fn round_trips_through_str() {
        for dtype in WeightDtype::ALL {
            assert_eq!(dtype.as_str().parse::<WeightDtype>().unwrap(), dtype);
        }
        for dtype in KvDtype::ALL {
            assert_eq!(dtype.as_str().parse::<KvDtype>().unwrap(), dtype);
        }
        assert_eq!(
            "q13".parse::<WeightDtype>(),
            Err(DtypeError::UnknownWeightDtype("q13".to_owned()))
        );
    }
}
