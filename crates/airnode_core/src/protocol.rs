//! Protocolo texto do agregador de monitoramento ambiental.
//!
//! Formato da mensagem:
//!
//! ```text
//! #<mac>#<node-id>\n
//! [#PM1_0#<valor>#PM1\n]
//! [#PM2_5#<valor>#PM2.5\n]
//! [#PM10_0#<valor>#PM10\n]
//! [#HI#<valor>#<rótulo metano>\n]
//! [#LO#<valor>#<rótulo voláteis>\n]
//! ##
//! ```
//!
//! Cada linha entre colchetes só aparece se a métrica é válida. A resposta
//! de sucesso é exatamente [`ACK`]; qualquer outra coisa é erro de protocolo.

use crate::types::{GasKind, ParticulateAverages, ParticulateMetric, format_value};

/// Confirmação esperada do agregador.
pub const ACK: &[u8] = b"OK\n";

/// Terminador da mensagem.
pub const TERMINATOR: &str = "##";

const SEPARATOR: char = '#';

/// Erros do protocolo.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Campo inválido {field:?}: {value:?} (não pode conter '#' nem quebra de linha)")]
    InvalidField { field: &'static str, value: String },

    #[error("Mensagem sem terminador '##'")]
    MissingTerminator,

    #[error("Cabeçalho ausente ou malformado: {0:?}")]
    BadHeader(String),

    #[error("Linha malformada: {0:?}")]
    MalformedLine(String),

    #[error("Tag desconhecida: {0}")]
    UnknownTag(String),

    #[error("Tag repetida: {0}")]
    DuplicateTag(String),

    #[error("Valor numérico inválido: {0:?}")]
    InvalidValue(String),
}

/// Leitura de gás com seu rótulo legível.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledValue {
    pub value: f64,
    pub label: String,
}

/// Conteúdo de um relatório ao agregador.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub hardware_id: String,
    pub node_id: String,
    pub particulate: ParticulateAverages,
    pub methane: Option<LabeledValue>,
    pub volatile: Option<LabeledValue>,
}

impl Report {
    /// `true` se não há nenhuma linha de dados.
    pub fn is_empty(&self) -> bool {
        self.particulate.is_empty() && self.methane.is_none() && self.volatile.is_none()
    }

    pub fn gas(&self, kind: GasKind) -> Option<&LabeledValue> {
        match kind {
            GasKind::Methane => self.methane.as_ref(),
            GasKind::Volatile => self.volatile.as_ref(),
        }
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.contains(SEPARATOR) || value.contains('\n') {
        return Err(ProtocolError::InvalidField {
            field,
            value: value.into(),
        });
    }
    Ok(())
}

fn push_line(out: &mut String, tag: &str, value: f64, label: &str) {
    out.push(SEPARATOR);
    out.push_str(tag);
    out.push(SEPARATOR);
    out.push_str(&format_value(value));
    out.push(SEPARATOR);
    out.push_str(label);
    out.push('\n');
}

/// Codifica um [`Report`] no formato texto do agregador.
pub fn encode_report(report: &Report) -> Result<String, ProtocolError> {
    check_field("hardware_id", &report.hardware_id)?;
    check_field("node_id", &report.node_id)?;

    let mut out = format!("#{}#{}\n", report.hardware_id, report.node_id);

    for metric in ParticulateMetric::REPORT_ORDER {
        if let Some(value) = report.particulate.get(metric) {
            push_line(&mut out, metric.report_tag(), value, metric.report_label());
        }
    }

    for kind in [GasKind::Methane, GasKind::Volatile] {
        if let Some(gas) = report.gas(kind) {
            check_field("label", &gas.label)?;
            push_line(&mut out, kind.report_tag(), gas.value, &gas.label);
        }
    }

    out.push_str(TERMINATOR);
    Ok(out)
}

/// Decodifica uma mensagem do agregador de volta em [`Report`].
///
/// Usado pelo lado receptor e pelos testes.
pub fn decode_report(message: &str) -> Result<Report, ProtocolError> {
    let body = message
        .strip_suffix(TERMINATOR)
        .ok_or(ProtocolError::MissingTerminator)?;

    let mut lines = body.split_terminator('\n');
    let header = lines.next().unwrap_or_default();
    let (hardware_id, node_id) = header
        .strip_prefix(SEPARATOR)
        .and_then(|h| h.split_once(SEPARATOR))
        .filter(|(hw, node)| !hw.is_empty() && !node.is_empty() && !node.contains(SEPARATOR))
        .ok_or_else(|| ProtocolError::BadHeader(header.into()))?;

    let mut report = Report {
        hardware_id: hardware_id.into(),
        node_id: node_id.into(),
        ..Default::default()
    };

    for line in lines {
        let mut parts = line
            .strip_prefix(SEPARATOR)
            .ok_or_else(|| ProtocolError::MalformedLine(line.into()))?
            .splitn(3, SEPARATOR);
        let (Some(tag), Some(raw), Some(label)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ProtocolError::MalformedLine(line.into()));
        };
        let value: f64 = raw
            .parse()
            .map_err(|_| ProtocolError::InvalidValue(raw.into()))?;

        if let Some(metric) = ParticulateMetric::from_report_tag(tag) {
            if report.particulate.get(metric).is_some() {
                return Err(ProtocolError::DuplicateTag(tag.into()));
            }
            report.particulate.set(metric, Some(value));
        } else if let Some(kind) = GasKind::from_report_tag(tag) {
            let slot = match kind {
                GasKind::Methane => &mut report.methane,
                GasKind::Volatile => &mut report.volatile,
            };
            if slot.is_some() {
                return Err(ProtocolError::DuplicateTag(tag.into()));
            }
            *slot = Some(LabeledValue {
                value,
                label: label.into(),
            });
        } else {
            return Err(ProtocolError::UnknownTag(tag.into()));
        }
    }

    Ok(report)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
