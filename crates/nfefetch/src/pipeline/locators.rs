//! Where things live on the portal's received-notes query page.
//!
//! Everything interactive sits inside the `iNetaccess` iframe; lookups
//! must happen with that frame context active.

use crate::browser::Locator;

pub fn portal_frame() -> Locator {
    Locator::id("iNetaccess")
}

pub fn start_date_field() -> Locator {
    Locator::id("cmpDataInicial")
}

pub fn end_date_field() -> Locator {
    Locator::id("cmpDataFinal")
}

pub fn entity_field() -> Locator {
    Locator::id("cmpNumIeDest")
}

pub fn model_selector() -> Locator {
    Locator::id("cmpModelo")
}

pub fn cancelled_notes_checkbox() -> Locator {
    Locator::id("cmpExbNotasCanceladas")
}

pub fn search_button() -> Locator {
    Locator::id("btnPesquisar")
}

pub fn download_all_button() -> Locator {
    Locator::text("Baixar todos os arquivos")
}

pub fn modal_title() -> Locator {
    Locator::text("Confirme a solicitação de download")
}

pub fn modal_option_label() -> Locator {
    Locator::text("Baixar documentos e eventos")
}

pub fn modal_confirm_button() -> Locator {
    Locator::id("dnwld-all-btn-ok")
}

pub fn download_history_title() -> Locator {
    Locator::text("Histórico de Downloads de XMLs")
}

pub fn new_query_button() -> Locator {
    Locator::text("Nova Consulta")
}
