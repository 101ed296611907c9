use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A geographic region pool used for weighted random assignment of
/// districts and payment-channel behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub region: String,
    pub districts: Vec<String>,
    /// Relative share of businesses located in this region.
    pub business_concentration: f64,
    /// Fraction of the region's payers comfortable with digital channels.
    pub digital_adoption: f64,
}

/// Economic profile of a business sector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorProfile {
    pub sector: String,
    pub subsectors: Vec<String>,
    /// Mean annual revenue; turnover is log-normal around this.
    pub avg_revenue: f64,
    /// Historical filing/payment compliance rate for the sector.
    pub compliance_rate: f64,
    /// Fraction of the sector's payments made digitally.
    pub digital_payment: f64,
    /// Sector draw weight inside the capital region.
    pub capital_weight: f64,
    /// Sector draw weight everywhere else.
    pub provincial_weight: f64,
}

/// Tunable knobs for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorParams {
    pub population: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Bernoulli probability that a taxpayer is drawn into the fraud set.
    pub fraud_fraction: f64,
    /// Annual turnover above which VAT registration is mandatory.
    pub vat_registration_threshold: f64,
    pub vat_rate: f64,
    /// Fraud underreporting factor range; drawn once per taxpayer-period.
    pub underreport_low: f64,
    pub underreport_high: f64,
    /// Per-period probability that a fraud-set taxpayer skips filing.
    pub paye_skip_probability: f64,
    pub vat_skip_probability: f64,
    /// Dispersion of the log-normal turnover draw, in log space.
    pub turnover_sigma: f64,
    /// Std-dev of the normal noise added to the sector compliance rate.
    pub compliance_noise: f64,
    /// How many months of revenue forecast to produce.
    pub forecast_horizon_months: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct RegionsFile {
    regions: Vec<RegionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct SectorsFile {
    sectors: Vec<SectorProfile>,
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub regions: Vec<RegionConfig>,
    pub sectors: Vec<SectorProfile>,
    pub generator: GeneratorParams,
}

impl WarehouseConfig {
    /// Load from the data/ directory.
    /// In tests, use WarehouseConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let regions_path = format!("{data_dir}/regions.json");
        let regions_content = std::fs::read_to_string(&regions_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {regions_path}: {e}"))?;
        let regions_file: RegionsFile = serde_json::from_str(&regions_content)?;

        let sectors_path = format!("{data_dir}/sectors.json");
        let sectors_content = std::fs::read_to_string(&sectors_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {sectors_path}: {e}"))?;
        let sectors_file: SectorsFile = serde_json::from_str(&sectors_content)?;

        let generator_path = format!("{data_dir}/generator.json");
        let generator_content = std::fs::read_to_string(&generator_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {generator_path}: {e}"))?;
        let generator: GeneratorParams = serde_json::from_str(&generator_content)?;

        let config = Self {
            regions: regions_file.regions,
            sectors: sectors_file.sectors,
            generator,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.generator.population == 0 {
            anyhow::bail!("population must be > 0");
        }
        if self.generator.start_date >= self.generator.end_date {
            anyhow::bail!("start_date must precede end_date");
        }
        if !(0.0..=1.0).contains(&self.generator.fraud_fraction) {
            anyhow::bail!("fraud_fraction must lie in [0, 1]");
        }
        if self.regions.is_empty() || self.sectors.is_empty() {
            anyhow::bail!("regions and sectors must be non-empty");
        }
        for region in &self.regions {
            if region.districts.is_empty() {
                anyhow::bail!("region '{}' has no districts", region.region);
            }
        }
        Ok(())
    }

    /// The capital region gets a more diverse sector mix; it is the
    /// first (highest-concentration) entry by convention.
    pub fn capital_region(&self) -> &str {
        &self.regions[0].region
    }

    pub fn region(&self, name: &str) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.region == name)
    }

    pub fn sector(&self, name: &str) -> Option<&SectorProfile> {
        self.sectors.iter().find(|s| s.sector == name)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let regions = vec![
            RegionConfig {
                region: "Greater Banjul Area".into(),
                districts: vec![
                    "Banjul".into(),
                    "Kanifing".into(),
                    "Kombo North".into(),
                    "Kombo South".into(),
                ],
                business_concentration: 0.45,
                digital_adoption: 0.7,
            },
            RegionConfig {
                region: "West Coast Region".into(),
                districts: vec!["Brikama".into(), "Foni".into()],
                business_concentration: 0.20,
                digital_adoption: 0.5,
            },
            RegionConfig {
                region: "Lower River Region".into(),
                districts: vec!["Soma".into(), "Jarra".into()],
                business_concentration: 0.10,
                digital_adoption: 0.3,
            },
            RegionConfig {
                region: "North Bank Region".into(),
                districts: vec!["Kerewan".into(), "Niumi".into()],
                business_concentration: 0.10,
                digital_adoption: 0.25,
            },
            RegionConfig {
                region: "Central River Region".into(),
                districts: vec!["Janjanbureh".into(), "Niani".into()],
                business_concentration: 0.08,
                digital_adoption: 0.2,
            },
            RegionConfig {
                region: "Upper River Region".into(),
                districts: vec!["Basse".into(), "Wuli".into()],
                business_concentration: 0.07,
                digital_adoption: 0.15,
            },
        ];

        let sectors = vec![
            SectorProfile {
                sector: "Telecommunications".into(),
                subsectors: vec![
                    "Mobile Services".into(),
                    "Internet Services".into(),
                    "Data Centers".into(),
                ],
                avg_revenue: 50_000_000.0,
                compliance_rate: 0.85,
                digital_payment: 0.9,
                capital_weight: 0.15,
                provincial_weight: 0.05,
            },
            SectorProfile {
                sector: "Banking".into(),
                subsectors: vec![
                    "Commercial Banking".into(),
                    "Microfinance".into(),
                    "Investment Banking".into(),
                ],
                avg_revenue: 100_000_000.0,
                compliance_rate: 0.95,
                digital_payment: 0.95,
                capital_weight: 0.20,
                provincial_weight: 0.05,
            },
            SectorProfile {
                sector: "Retail".into(),
                subsectors: vec![
                    "Supermarket".into(),
                    "Electronics".into(),
                    "Clothing".into(),
                    "Hardware".into(),
                ],
                avg_revenue: 5_000_000.0,
                compliance_rate: 0.65,
                digital_payment: 0.4,
                capital_weight: 0.30,
                provincial_weight: 0.35,
            },
            SectorProfile {
                sector: "Manufacturing".into(),
                subsectors: vec![
                    "Food Processing".into(),
                    "Textiles".into(),
                    "Construction Materials".into(),
                ],
                avg_revenue: 20_000_000.0,
                compliance_rate: 0.75,
                digital_payment: 0.6,
                capital_weight: 0.15,
                provincial_weight: 0.10,
            },
            SectorProfile {
                sector: "Tourism".into(),
                subsectors: vec![
                    "Hotels".into(),
                    "Restaurants".into(),
                    "Tour Operations".into(),
                ],
                avg_revenue: 15_000_000.0,
                compliance_rate: 0.70,
                digital_payment: 0.7,
                capital_weight: 0.10,
                provincial_weight: 0.05,
            },
            SectorProfile {
                sector: "Agriculture".into(),
                subsectors: vec![
                    "Crop Production".into(),
                    "Livestock".into(),
                    "Fisheries".into(),
                ],
                avg_revenue: 8_000_000.0,
                compliance_rate: 0.55,
                digital_payment: 0.2,
                capital_weight: 0.10,
                provincial_weight: 0.40,
            },
        ];

        Self {
            regions,
            sectors,
            generator: GeneratorParams {
                population: 60,
                start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                fraud_fraction: 0.075,
                vat_registration_threshold: 1_000_000.0,
                vat_rate: 0.15,
                underreport_low: 0.5,
                underreport_high: 0.8,
                paye_skip_probability: 0.3,
                vat_skip_probability: 0.2,
                turnover_sigma: 0.5,
                compliance_noise: 0.15,
                forecast_horizon_months: 6,
            },
        }
    }
}
