//! The fixed set of indicator fields collected for every symbol.
//!
//! Names are what users type in filter expressions; columns are what the
//! TradingView scanner calls them (before the `|<interval>` suffix).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub column: &'static str,
    /// Optional fields may be absent from a row; any other missing field drops the row.
    pub optional: bool,
}

impl Field {
    const fn required(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            optional: false,
        }
    }

    const fn optional(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            optional: true,
        }
    }
}

/// Text field holding the instrument ticker.
pub const SYMBOL: &str = "symbol";

pub const FIELDS: &[Field] = &[
    Field::required("recommend_other", "Recommend.Other"),
    Field::required("recommend_all", "Recommend.All"),
    Field::required("recommend_ma", "Recommend.MA"),
    Field::required("rsi", "RSI"),
    Field::required("rsi_1", "RSI[1]"),
    Field::required("stoch_k", "Stoch.K"),
    Field::required("stoch_d", "Stoch.D"),
    Field::required("stoch_k_1", "Stoch.K[1]"),
    Field::required("stoch_d_1", "Stoch.D[1]"),
    Field::required("cci20", "CCI20"),
    Field::required("cci20_1", "CCI20[1]"),
    Field::required("adx", "ADX"),
    Field::required("adx_plus_di", "ADX+DI"),
    Field::required("adx_minus_di", "ADX-DI"),
    Field::required("adx_plus_di_1", "ADX+DI[1]"),
    Field::required("adx_minus_di_1", "ADX-DI[1]"),
    Field::required("ao", "AO"),
    Field::required("ao_1", "AO[1]"),
    Field::required("mom", "Mom"),
    Field::required("mom_1", "Mom[1]"),
    Field::required("macd", "MACD.macd"),
    Field::required("macd_signal", "MACD.signal"),
    Field::required("rec_stoch_rsi", "Rec.Stoch.RSI"),
    Field::required("stoch_rsi_k", "Stoch.RSI.K"),
    Field::required("rec_wr", "Rec.WR"),
    Field::required("wr", "W.R"),
    Field::required("rec_bbpower", "Rec.BBPower"),
    Field::required("bbpower", "BBPower"),
    Field::required("rec_uo", "Rec.UO"),
    Field::required("uo", "UO"),
    Field::required("close", "close"),
    Field::required("ema5", "EMA5"),
    Field::required("sma5", "SMA5"),
    Field::required("ema10", "EMA10"),
    Field::required("sma10", "SMA10"),
    Field::required("ema20", "EMA20"),
    Field::required("sma20", "SMA20"),
    Field::required("ema30", "EMA30"),
    Field::required("sma30", "SMA30"),
    Field::required("ema50", "EMA50"),
    Field::required("sma50", "SMA50"),
    Field::optional("ema100", "EMA100"),
    Field::optional("sma100", "SMA100"),
    Field::optional("ema200", "EMA200"),
    Field::optional("sma200", "SMA200"),
    Field::optional("rec_ichimoku", "Rec.Ichimoku"),
    Field::optional("ichimoku_bline", "Ichimoku.BLine"),
    Field::required("rec_vwma", "Rec.VWMA"),
    Field::required("vwma", "VWMA"),
    Field::required("rec_hullma9", "Rec.HullMA9"),
    Field::required("hullma9", "HullMA9"),
    Field::required("pivot_m_classic_s3", "Pivot.M.Classic.S3"),
    Field::required("pivot_m_classic_s2", "Pivot.M.Classic.S2"),
    Field::required("pivot_m_classic_s1", "Pivot.M.Classic.S1"),
    Field::required("pivot_m_classic_middle", "Pivot.M.Classic.Middle"),
    Field::required("pivot_m_classic_r1", "Pivot.M.Classic.R1"),
    Field::required("pivot_m_classic_r2", "Pivot.M.Classic.R2"),
    Field::required("pivot_m_classic_r3", "Pivot.M.Classic.R3"),
    Field::required("pivot_m_fibonacci_s3", "Pivot.M.Fibonacci.S3"),
    Field::required("pivot_m_fibonacci_s2", "Pivot.M.Fibonacci.S2"),
    Field::required("pivot_m_fibonacci_s1", "Pivot.M.Fibonacci.S1"),
    Field::required("pivot_m_fibonacci_middle", "Pivot.M.Fibonacci.Middle"),
    Field::required("pivot_m_fibonacci_r1", "Pivot.M.Fibonacci.R1"),
    Field::required("pivot_m_fibonacci_r2", "Pivot.M.Fibonacci.R2"),
    Field::required("pivot_m_fibonacci_r3", "Pivot.M.Fibonacci.R3"),
    Field::required("pivot_m_camarilla_s3", "Pivot.M.Camarilla.S3"),
    Field::required("pivot_m_camarilla_s2", "Pivot.M.Camarilla.S2"),
    Field::required("pivot_m_camarilla_s1", "Pivot.M.Camarilla.S1"),
    Field::required("pivot_m_camarilla_middle", "Pivot.M.Camarilla.Middle"),
    Field::required("pivot_m_camarilla_r1", "Pivot.M.Camarilla.R1"),
    Field::required("pivot_m_camarilla_r2", "Pivot.M.Camarilla.R2"),
    Field::required("pivot_m_camarilla_r3", "Pivot.M.Camarilla.R3"),
    Field::required("pivot_m_woodie_s3", "Pivot.M.Woodie.S3"),
    Field::required("pivot_m_woodie_s2", "Pivot.M.Woodie.S2"),
    Field::required("pivot_m_woodie_s1", "Pivot.M.Woodie.S1"),
    Field::required("pivot_m_woodie_middle", "Pivot.M.Woodie.Middle"),
    Field::required("pivot_m_woodie_r1", "Pivot.M.Woodie.R1"),
    Field::required("pivot_m_woodie_r2", "Pivot.M.Woodie.R2"),
    Field::required("pivot_m_woodie_r3", "Pivot.M.Woodie.R3"),
    Field::required("pivot_m_demark_s1", "Pivot.M.Demark.S1"),
    Field::required("pivot_m_demark_middle", "Pivot.M.Demark.Middle"),
    Field::required("pivot_m_demark_r1", "Pivot.M.Demark.R1"),
    Field::required("open", "open"),
    Field::required("psar", "P.SAR"),
    Field::required("bb_lower", "BB.lower"),
    Field::required("bb_upper", "BB.upper"),
    Field::required("ao_2", "AO[2]"),
    Field::required("volume", "volume"),
    Field::required("change", "change"),
    Field::required("low", "low"),
    Field::required("high", "high"),
];

/// Anything a filter expression may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef {
    Symbol,
    Indicator(&'static Field),
}

impl FieldRef {
    pub fn name(&self) -> &'static str {
        match self {
            FieldRef::Symbol => SYMBOL,
            FieldRef::Indicator(field) => field.name,
        }
    }
}

pub fn resolve(name: &str) -> Option<FieldRef> {
    if name.eq_ignore_ascii_case(SYMBOL) {
        return Some(FieldRef::Symbol);
    }
    FIELDS
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
        .map(FieldRef::Indicator)
}
