// Row classifier - tells trade lines apart from headers, footers and summaries
//
// Negotiation tables (11 columns) repeat their own inline sub-headers, so a
// short block-list is enough there. Every other table gets the full list.

/// Words typical of column headers.
const HEADER_KEYWORDS: [&str; 9] = [
    "data", "ativo", "especif", "qtd", "preço", "valor", "operação", "nota", "corretora",
];

/// Block-list applied to rows of negotiation tables.
const STRICT_SKIP_KEYWORDS: [&str; 16] = [
    "resumo",
    "total",
    "debêntures",
    "taxa",
    "emolumentos",
    "custos",
    "líquido para",
    "client",
    "código",
    "c.p.f",
    "cpf",
    "cnpj",
    "observações",
    "(*)",
    "saldo",
    "conta",
];

/// Block-list applied to rows of any other table.
const FULL_SKIP_KEYWORDS: [&str; 47] = [
    "resumo",
    "total",
    "debêntures",
    "vendas",
    "compras",
    "opções",
    "termo",
    "taxa",
    "emolumentos",
    "transf",
    "ativos",
    "custodiante",
    "clearing",
    "especificações",
    "bovespa",
    "cblc",
    "cliente",
    "código",
    "assessor",
    "participante",
    "folha",
    "data pregão",
    "negociação",
    "c.p.f",
    "cpf",
    "cnpj",
    "valor das oper",
    "valor líquido",
    "qualificado",
    "nota de negociação",
    "impostos",
    "i.r.r.f",
    "irrf",
    "execução",
    "custódia",
    "bolsa",
    "operacional",
    "custos",
    "agente",
    "coluna q",
    "liquidação",
    "(*)",
    "observações",
    "líquido para",
    "saldo",
    "conta",
    "c.m.c",
];

/// Header heuristic: more than three colons, or at least two header words.
pub fn is_likely_header<S: AsRef<str>>(cells: &[S]) -> bool {
    if cells.is_empty() {
        return false;
    }

    let text = joined_lowercase(cells);
    if text.matches(':').count() > 3 {
        return true;
    }

    HEADER_KEYWORDS
        .iter()
        .filter(|kw| text.contains(*kw))
        .count()
        >= 2
}

/// True when the row looks like a genuine trade line.
///
/// Rejects rows with fewer than two cells, header-like rows, rows hitting
/// the block-list for the table kind and rows without any digit. Blank cells
/// count towards the width: a padded row keeps its shape.
pub fn is_valid_data_row<S: AsRef<str>>(cells: &[S], is_negotiation_table: bool) -> bool {
    if cells.len() < 2 {
        return false;
    }

    if is_likely_header(cells) {
        return false;
    }

    let text = joined_lowercase(cells);
    let block_list: &[&str] = if is_negotiation_table {
        &STRICT_SKIP_KEYWORDS
    } else {
        &FULL_SKIP_KEYWORDS
    };
    if block_list.iter().any(|kw| text.contains(kw)) {
        return false;
    }

    cells
        .iter()
        .any(|c| c.as_ref().chars().any(|ch| ch.is_ascii_digit()))
}

fn joined_lowercase<S: AsRef<str>>(cells: &[S]) -> String {
    cells
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_row_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(!is_valid_data_row(&empty, false));
        assert!(!is_valid_data_row(&empty, true));
        assert!(!is_valid_data_row(&["VALE3 100"], true));
    }

    #[test]
    fn test_blank_cells_count_towards_row_width() {
        assert!(is_valid_data_row(&["", "", "VALE3 100"], true));
        assert!(is_valid_data_row(&["", "VALE3 100"], false));
    }

    #[test]
    fn test_client_identification_rows_are_rejected() {
        assert!(!is_valid_data_row(&["CPF 123.456.789-00", "100"], true));
        assert!(!is_valid_data_row(&["CPF 123.456.789-00", "100"], false));
        assert!(!is_valid_data_row(&["C.P.F./C.N.P.J", "123.456.789-00"], true));
        assert!(!is_valid_data_row(&["CNPJ 12.345.678/0001-90", "1"], true));
    }

    #[test]
    fn test_header_detection() {
        assert!(is_likely_header(&["Data:", "Ativo:", "Operação:", "Quantidade:", "Preço:"]));
        assert!(is_likely_header(&["Negociação", "Especificação", "Data pregão"]));
        assert!(!is_likely_header(&["04/05/2024", "VALE3", "C", "100", "24.50"]));
        let empty: [&str; 0] = [];
        assert!(!is_likely_header(&empty));
    }

    #[test]
    fn test_resumo_is_always_rejected() {
        let row = ["", "RESUMO DOS NEGÓCIOS", "", "1.234,56"];
        assert!(!is_valid_data_row(&row, true));
        assert!(!is_valid_data_row(&row, false));
        assert!(!is_valid_data_row(&["Resumo", "10"], true));
    }

    #[test]
    fn test_plain_trade_row_is_accepted() {
        let row = ["04/05/2024", "VALE3", "C", "100", "24,50"];
        assert!(is_valid_data_row(&row, false));
        assert!(is_valid_data_row(&row, true));
    }

    #[test]
    fn test_negotiation_row_with_bovespa_only_passes_strict_list() {
        let row = [
            "1-BOVESPA", "", "C", "VISTA", "", "EMBRAER ON NM", "", "100", "24,20", "2.420,00", "D",
        ];
        assert!(is_valid_data_row(&row, true));
        assert!(!is_valid_data_row(&row, false));
    }

    #[test]
    fn test_accented_keywords_match_uppercase_rows() {
        assert!(!is_valid_data_row(&["TAXA DE LIQUIDAÇÃO", "1,23"], false));
        assert!(!is_valid_data_row(&["LÍQUIDO PARA 06/05/2024", "1.000,00"], true));
        assert!(!is_valid_data_row(&["DEBÊNTURES", "0,00"], true));
    }

    #[test]
    fn test_row_without_digits_is_rejected() {
        assert!(!is_valid_data_row(&["", "", "", "", "", "Embraer ON NM"], true));
        assert!(is_valid_data_row(&["", "", "", "", "", "Embraer ON NM", "", "100"], true));
    }
}
